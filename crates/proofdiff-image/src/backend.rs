// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compare backends. A run picks one backend at startup and every worker calls
// it through the `CompareBackend` trait:
//
// - `MultiResolutionBackend` decodes both pages and runs the built-in
//   multi-resolution diff plus the pointwise MAE.
// - `ImageMagickBackend` shells out to ImageMagick's `compare` and reads the
//   normalised MAE figure from its report.

use std::path::Path;
use std::process::Command;

use proofdiff_core::config::RunConfig;
use proofdiff_core::error::{ProofdiffError, Result};
use proofdiff_core::types::BackendKind;
use regex::Regex;
use tracing::{debug, instrument};

use crate::mae::mean_absolute_error;
use crate::multires::MultiResolutionDiff;
use crate::raster::Raster;

/// Pattern for the overall figure in `compare -verbose -metric MAE` output,
/// e.g. `all: 1234.5 (0.0188)`; the parenthesised value is normalised.
const MAE_REPORT_PATTERN: &str = r"all: [0-9.e-]* \(([0-9.e-]*)\)";

/// Outcome of comparing one page pair.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Scalar page distance; 0 means the pages look identical.
    pub distance: f64,
    /// Pointwise mean absolute error, if the backend computes one.
    pub mae: Option<f64>,
    /// Visualization still to be written. `None` when the backend wrote its
    /// own diff image or has none.
    pub visualization: Option<Raster>,
}

/// Something that can score how different two page files look.
pub trait CompareBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Compare `old` with `new`. `diff_out` is where the page's diff image
    /// belongs; only backends that produce the file themselves touch it.
    fn compare(&self, page: &str, old: &Path, new: &Path, diff_out: &Path) -> Result<Comparison>;
}

/// Build the backend selected by `config`.
pub fn from_config(config: &RunConfig) -> Result<Box<dyn CompareBackend>> {
    Ok(match config.backend {
        BackendKind::MultiResolution => Box::new(MultiResolutionBackend::new(
            MultiResolutionDiff::new(config.level_weighting)
                .clamp_range_faults(config.clamp_range_faults),
        )),
        BackendKind::ImageMagick => Box::new(ImageMagickBackend::new(&config.diff_tool)?),
    })
}

/// Built-in multi-resolution comparison.
#[derive(Debug, Clone, Default)]
pub struct MultiResolutionBackend {
    diff: MultiResolutionDiff,
}

impl MultiResolutionBackend {
    pub fn new(diff: MultiResolutionDiff) -> Self {
        Self { diff }
    }

    /// Compare two already-decoded rasters.
    pub fn compare_rasters(&self, page: &str, old: &Raster, new: &Raster) -> Result<Comparison> {
        let outcome = self.diff.compare(page, old, new)?;
        Ok(Comparison {
            distance: outcome.distance,
            mae: Some(mean_absolute_error(old, new)),
            visualization: Some(outcome.visualization),
        })
    }
}

impl CompareBackend for MultiResolutionBackend {
    fn name(&self) -> &'static str {
        "multi-resolution"
    }

    fn compare(&self, page: &str, old: &Path, new: &Path, _diff_out: &Path) -> Result<Comparison> {
        let old = Raster::open(old)?;
        let new = Raster::open(new)?;
        self.compare_rasters(page, &old, &new)
    }
}

/// ImageMagick `compare` adapter.
#[derive(Debug, Clone)]
pub struct ImageMagickBackend {
    program: String,
    report: Regex,
}

impl ImageMagickBackend {
    pub fn new(program: impl Into<String>) -> Result<Self> {
        Ok(Self {
            program: program.into(),
            report: Regex::new(MAE_REPORT_PATTERN)?,
        })
    }

    /// Extract the normalised MAE from a `compare -verbose` report.
    pub fn parse_report(&self, report: &str) -> Result<f64> {
        let figure = self
            .report
            .captures(report)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| ProofdiffError::DiffToolOutput("no overall MAE figure".into()))?;
        figure.as_str().parse::<f64>().map_err(|err| {
            ProofdiffError::DiffToolOutput(format!("bad MAE figure {:?}: {err}", figure.as_str()))
        })
    }
}

impl CompareBackend for ImageMagickBackend {
    fn name(&self) -> &'static str {
        "image-magick"
    }

    #[instrument(skip(self, old, new, diff_out))]
    fn compare(&self, page: &str, old: &Path, new: &Path, diff_out: &Path) -> Result<Comparison> {
        let output = Command::new(&self.program)
            .args(["-verbose", "-metric", "MAE"])
            .arg(old)
            .arg(new)
            .arg(diff_out)
            .output()
            .map_err(|e| ProofdiffError::DiffTool(format!("cannot run {}: {e}", self.program)))?;

        // Exit status 1 only means the images differ.
        match output.status.code() {
            Some(0) | Some(1) => {}
            code => {
                return Err(ProofdiffError::DiffTool(format!(
                    "{} exited with {:?}: {}",
                    self.program,
                    code,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }

        let mut report = String::from_utf8_lossy(&output.stdout).into_owned();
        report.push_str(&String::from_utf8_lossy(&output.stderr));
        let distance = self.parse_report(&report)?;
        debug!(distance, "ImageMagick compare finished");
        Ok(Comparison {
            distance,
            mae: None,
            visualization: None,
        })
    }
}

// -- Tests --------------------------------------------------------------------
