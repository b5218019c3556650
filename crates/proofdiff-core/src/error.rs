// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for proofdiff.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all proofdiff operations.
#[derive(Debug, Error)]
pub enum ProofdiffError {
    // -- Filesystem --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{op} {}: {source}", path.display())]
    FileOp {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -- Rasters --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("multi-scale diff out of range on page {page} at ({x}, {y}): {value}")]
    RangeViolation {
        page: String,
        x: i32,
        y: i32,
        value: f64,
    },

    // -- Vector conversion --
    #[error("bad bounding box in {}: {detail}", path.display())]
    BoundingBox { path: PathBuf, detail: String },

    #[error("interpreter failed: {0}")]
    Interpreter(String),

    // -- External diff tool --
    #[error("diff tool failed: {0}")]
    DiffTool(String),

    #[error("unparseable diff tool output: {0}")]
    DiffToolOutput(String),

    // -- Configuration --
    #[error("invalid page pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Scheduling --
    #[error("page {name} failed: {detail}")]
    Page { name: String, detail: String },
}

impl ProofdiffError {
    /// Wrap an I/O error with the operation and path it concerned.
    pub fn file_op(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOp {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProofdiffError>;
