// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One end-to-end run: discover, rasterize, compare, rank, report.

use std::path::Path;

use proofdiff_core::config::RunConfig;
use proofdiff_core::error::{ProofdiffError, Result};
use proofdiff_core::types::CompareResult;
use proofdiff_image::CompareBackend;
use proofdiff_render::Rasterizer;
use tracing::{info, instrument};

use crate::discovery::discover;
use crate::report;
use crate::scheduler::Scheduler;

/// Drives a comparison of two page directories.
pub struct Pipeline<'a> {
    config: &'a RunConfig,
    backend: &'a dyn CompareBackend,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a RunConfig, backend: &'a dyn CompareBackend) -> Self {
        Self { config, backend }
    }

    /// Compare `old_dir` with `new_dir`, filling `out_dir` with page images,
    /// diffs and `index.html`.
    ///
    /// `out_dir` is emptied first. Conversion must finish for every page
    /// before any comparison starts; any conversion or comparison failure
    /// aborts the run before a report is written.
    #[instrument(skip_all, fields(out = %out_dir.display()))]
    pub fn run(&self, old_dir: &Path, new_dir: &Path, out_dir: &Path) -> Result<CompareResult> {
        recreate_dir(out_dir)?;

        let pattern = self.config.page_regex()?;
        let mut result = discover(old_dir, new_dir, &pattern)?;

        Rasterizer::from_config(self.config).render_pages(&mut result, out_dir)?;
        Scheduler::new(self.backend, self.config.compare_jobs).run(&mut result, out_dir)?;

        report::rank(&mut result, self.config.max_results);
        report::link_files(&result, out_dir)?;
        report::write_html_file(&result, out_dir)?;
        info!(
            pages = result.pages.len(),
            ranked = result.ranked.len(),
            "Run complete"
        );
        Ok(result)
    }
}

fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| ProofdiffError::file_op("remove", dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| ProofdiffError::file_op("create dir", dir, e))
}

// -- Tests --------------------------------------------------------------------
