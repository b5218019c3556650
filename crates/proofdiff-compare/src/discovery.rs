// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page discovery: match page files between the two input directories by name.

use std::path::Path;

use proofdiff_core::error::{ProofdiffError, Result};
use proofdiff_core::types::{CompareResult, Side};
use regex::Regex;
use tracing::{debug, info, instrument};

/// Scan the top level of both directories for files whose name matches
/// `pattern` and pair them by file stem.
///
/// Pages present on one side only are kept in the result but are not
/// diffable.
#[instrument(skip_all, fields(old = %old_dir.display(), new = %new_dir.display()))]
pub fn discover(old_dir: &Path, new_dir: &Path, pattern: &Regex) -> Result<CompareResult> {
    let mut result = CompareResult::new(old_dir, new_dir);

    for (side, dir) in Side::BOTH.into_iter().zip([old_dir, new_dir]) {
        let entries = std::fs::read_dir(dir).map_err(|e| ProofdiffError::file_op("read dir", dir, e))?;
        let mut matched = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| ProofdiffError::file_op("read dir", dir, e))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !pattern.is_match(name) {
                continue;
            }
            let Some(stem) = Path::new(name).file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            result.insert(stem, side, entry.path());
            matched += 1;
        }
        debug!(dir = %dir.display(), matched, "Scanned page directory");
    }

    for task in result.one_sided() {
        let side = if task.input(Side::Old).is_some() { Side::Old } else { Side::New };
        info!(
            page = %task.name,
            only_in = %result.dirs[side.index()].display(),
            "Page exists in one run only"
        );
    }
    info!(
        pages = result.pages.len(),
        diffable = result.diffable_count(),
        "Discovery complete"
    );
    Ok(result)
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proofdiff_core::config::DEFAULT_PAGE_PATTERN;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn pairs_pages_by_name() {
        let old = tempfile::tempdir().unwrap();
        let new = tempfile::tempdir().unwrap();
        touch(old.path(), "foo-1.png");
        touch(old.path(), "bar-2.png");
        touch(new.path(), "foo-1.png");
        touch(new.path(), "baz-3.png");

        let re = Regex::new(DEFAULT_PAGE_PATTERN).unwrap();
        let result = discover(old.path(), new.path(), &re).unwrap();

        assert_eq!(result.pages.len(), 3);
        assert_eq!(result.diffable_count(), 1);
        assert_eq!(result.dirs, [old.path().to_path_buf(), new.path().to_path_buf()]);
        assert!(result.pages["foo-1"].is_diffable());

        let bar = &result.pages["bar-2"];
        assert!(bar.input(Side::Old).is_some() && bar.input(Side::New).is_none());
        let baz = &result.pages["baz-3"];
        assert!(baz.input(Side::Old).is_none() && baz.input(Side::New).is_some());
    }

    #[test]
    fn ignores_non_page_files() {
        let old = tempfile::tempdir().unwrap();
        let new = tempfile::tempdir().unwrap();
        touch(old.path(), "notes.txt");
        touch(old.path(), "cover.png");
        touch(old.path(), "score-1.eps");
        std::fs::create_dir(old.path().join("nested-4.png")).unwrap();

        let re = Regex::new(DEFAULT_PAGE_PATTERN).unwrap();
        let result = discover(old.path(), new.path(), &re).unwrap();
        let names: Vec<_> = result.pages.keys().cloned().collect();
        assert_eq!(names, vec!["score-1".to_string()]);
    }

    #[test]
    fn raster_preferred_over_vector_on_same_side() {
        let old = tempfile::tempdir().unwrap();
        let new = tempfile::tempdir().unwrap();
        touch(old.path(), "p-1.eps");
        touch(old.path(), "p-1.png");
        touch(new.path(), "p-1.eps");

        let re = Regex::new(DEFAULT_PAGE_PATTERN).unwrap();
        let result = discover(old.path(), new.path(), &re).unwrap();
        let task = &result.pages["p-1"];
        assert_eq!(task.input(Side::Old), Some(old.path().join("p-1.png").as_path()));
        assert_eq!(task.input(Side::New), Some(new.path().join("p-1.eps").as_path()));
    }

    #[test]
    fn missing_directory_is_error() {
        let new = tempfile::tempdir().unwrap();
        let re = Regex::new(DEFAULT_PAGE_PATTERN).unwrap();
        let err = discover(Path::new("/nonexistent/run-a"), new.path(), &re).unwrap_err();
        assert!(matches!(err, ProofdiffError::FileOp { op: "read dir", .. }));
    }
}
