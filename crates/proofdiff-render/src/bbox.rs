// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `%%BoundingBox:` header inspection for EPS files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use proofdiff_core::error::{ProofdiffError, Result};

/// How much of a file is scanned for the bounding-box comment.
pub const HEADER_LEN: u64 = 1024;

const MARKER: &str = "%%BoundingBox:";

/// Declared page extent, in PostScript points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i64,
    pub bottom: i64,
    pub right: i64,
    pub top: i64,
}

impl BoundingBox {
    /// Zero or negative width or height.
    pub fn is_degenerate(&self) -> bool {
        self.left >= self.right || self.bottom >= self.top
    }

    /// Parse the first `%%BoundingBox: l b r t` line of `header`.
    pub fn parse(header: &str) -> std::result::Result<Self, String> {
        let line = header
            .lines()
            .find_map(|line| line.strip_prefix(MARKER))
            .ok_or_else(|| "no %%BoundingBox comment in header".to_string())?;

        let dims = line
            .split_whitespace()
            .map(|field| {
                field
                    .parse::<i64>()
                    .map_err(|_| format!("non-integer bounding box field {field:?}"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        match dims[..] {
            [left, bottom, right, top] => Ok(Self {
                left,
                bottom,
                right,
                top,
            }),
            _ => Err(format!("expected 4 bounding box fields, got {}", dims.len())),
        }
    }

    /// Read the header of `path` and parse its bounding box.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ProofdiffError::file_op("open", path, e))?;
        let mut buf = Vec::with_capacity(HEADER_LEN as usize);
        file.take(HEADER_LEN)
            .read_to_end(&mut buf)
            .map_err(|e| ProofdiffError::file_op("read", path, e))?;

        Self::parse(&String::from_utf8_lossy(&buf)).map_err(|detail| ProofdiffError::BoundingBox {
            path: path.to_path_buf(),
            detail,
        })
    }
}

/// Whether the EPS file at `path` declares an empty page.
pub fn is_degenerate(path: impl AsRef<Path>) -> Result<bool> {
    Ok(BoundingBox::read(path)?.is_degenerate())
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "%!PS-Adobe-3.0 EPSF-3.0\n%%Creator: test\n%%BoundingBox: 0 -3 595 842\n%%EndComments\n";

    #[test]
    fn parse_regular_box() {
        let bbox = BoundingBox::parse(HEADER).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                left: 0,
                bottom: -3,
                right: 595,
                top: 842
            }
        );
        assert!(!bbox.is_degenerate());
    }

    #[test]
    fn zero_width_or_height_is_degenerate() {
        let flat = BoundingBox::parse("%%BoundingBox: 10 10 20 10\n").unwrap();
        assert!(flat.is_degenerate());
        let inverted = BoundingBox::parse("%%BoundingBox: 30 0 20 10\n").unwrap();
        assert!(inverted.is_degenerate());
    }

    #[test]
    fn missing_marker_is_error() {
        assert!(BoundingBox::parse("%!PS-Adobe-3.0\n%%EndComments\n").is_err());
    }

    #[test]
    fn malformed_fields_are_errors() {
        assert!(BoundingBox::parse("%%BoundingBox: (atend)\n").is_err());
        assert!(BoundingBox::parse("%%BoundingBox: 0 0 10\n").is_err());
        assert!(BoundingBox::parse("%%BoundingBox: 0 0 1.5 10\n").is_err());
    }

    #[test]
    fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page-1.eps");
        std::fs::write(&path, HEADER).unwrap();
        assert!(!is_degenerate(&path).unwrap());

        let empty = dir.path().join("page-2.eps");
        std::fs::write(&empty, "%!PS-Adobe-3.0 EPSF-3.0\n%%BoundingBox: 0 0 0 0\n").unwrap();
        assert!(is_degenerate(&empty).unwrap());
    }

    #[test]
    fn marker_past_header_window_is_not_seen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page-1.eps");
        let mut text = "%".repeat(HEADER_LEN as usize);
        text.push_str("\n%%BoundingBox: 0 0 10 10\n");
        std::fs::write(&path, text).unwrap();
        assert!(matches!(
            BoundingBox::read(&path),
            Err(ProofdiffError::BoundingBox { .. })
        ));
    }

    #[test]
    fn missing_file_is_file_op_error() {
        assert!(matches!(
            BoundingBox::read("/nonexistent/page-1.eps"),
            Err(ProofdiffError::FileOp { op: "open", .. })
        ));
    }
}
