// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proofdiff: visual regression testing for rendered document pages
//
// Entry point. Parses arguments, builds the run configuration, initialises
// logging, and runs one comparison. The ranked listing goes to stdout; logs go
// to stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use proofdiff_compare::{Pipeline, report};
use proofdiff_core::error::Result;
use proofdiff_core::types::{BackendKind, CompareResult, LevelWeighting};
use proofdiff_core::RunConfig;
use proofdiff_image::backend;
use tracing_subscriber::EnvFilter;

/// Compare two directories of rendered pages and rank them by visual
/// difference.
///
/// Page files are matched by name between OLD_DIR and NEW_DIR. EPS pages are
/// rasterized first; every pair is then compared and OUT_DIR receives the page
/// images, per-page diff images and an index.html gallery.
#[derive(Parser, Debug)]
#[command(name = "proofdiff")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXIT CODES:
    0 - Success
    1 - Run failed (conversion, comparison or output error)
    2 - Usage or configuration error")]
struct Cli {
    /// Directory with the baseline pages
    #[arg(value_name = "OLD_DIR")]
    old_dir: PathBuf,

    /// Directory with the pages under test
    #[arg(value_name = "NEW_DIR")]
    new_dir: PathBuf,

    /// Output directory (removed and recreated)
    #[arg(value_name = "OUT_DIR")]
    out_dir: PathBuf,

    /// JSON configuration file; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Worker threads for EPS conversion
    #[arg(long, value_name = "N")]
    render_jobs: Option<usize>,

    /// Worker threads for page comparison
    #[arg(long, value_name = "N")]
    compare_jobs: Option<usize>,

    /// Start the interpreter once per page instead of once per worker
    #[arg(long)]
    no_batch: bool,

    /// Use the resource tree next to the input directories
    #[arg(long)]
    local: bool,

    /// Report only the N most different pages (0 = all)
    #[arg(long, value_name = "N")]
    max: Option<usize>,

    /// Regular expression a file name must match to count as a page
    #[arg(long, value_name = "REGEX")]
    pattern: Option<String>,

    /// Compare with ImageMagick's `compare` instead of the built-in diff
    #[arg(long)]
    imagemagick: bool,

    /// Weigh pyramid level k by RATIO^k instead of uniformly
    #[arg(long, value_name = "RATIO")]
    level_ratio: Option<f64>,

    /// Clamp out-of-range diff values with a warning instead of failing
    #[arg(long)]
    clamp: bool,

    /// Debug logging and per-page interpreter progress
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Load the config file, if any, and apply flag overrides.
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(n) = self.render_jobs {
            config.render_jobs = n;
        }
        if let Some(n) = self.compare_jobs {
            config.compare_jobs = n;
        }
        if self.no_batch {
            config.batch = false;
        }
        if self.local {
            config.local_resources = true;
        }
        if let Some(max) = self.max {
            config.max_results = max;
        }
        if let Some(pattern) = &self.pattern {
            config.page_pattern = pattern.clone();
        }
        if self.imagemagick {
            config.backend = BackendKind::ImageMagick;
        }
        if let Some(ratio) = self.level_ratio {
            config.level_weighting = LevelWeighting::Geometric { ratio };
        }
        if self.clamp {
            config.clamp_range_faults = true;
        }
        if self.verbose {
            config.verbose = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.run_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.verbose);
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };
    init_logging(config.verbose);

    let backend = match backend::from_config(&config) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "Cannot set up compare backend");
            return ExitCode::from(2);
        }
    };
    tracing::info!(backend = %config.backend, "Proofdiff starting");

    let result = match Pipeline::new(&config, backend.as_ref()).run(
        &cli.old_dir,
        &cli.new_dir,
        &cli.out_dir,
    ) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = print_listing(&result) {
        tracing::error!(error = %e, "Cannot write listing");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn print_listing(result: &CompareResult) -> Result<()> {
    let mut stdout = io::stdout().lock();
    report::write_listing(result, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

// -- Tests --------------------------------------------------------------------
