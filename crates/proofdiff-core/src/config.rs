// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run configuration. One immutable value built at startup and handed to every
// component; nothing reads process-wide switches.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProofdiffError, Result};
use crate::types::{BackendKind, LevelWeighting};

/// Default file-name pattern for page files: a trailing page number before a
/// vector or raster extension, e.g. `score-12.eps`.
pub const DEFAULT_PAGE_PATTERN: &str = r"-[0-9]+\.(eps|png)$";

/// Settings for a single comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Worker threads for vector-to-raster conversion.
    pub render_jobs: usize,
    /// Worker threads for page comparison.
    pub compare_jobs: usize,
    /// Run the interpreter once per worker batch instead of once per page.
    pub batch: bool,
    /// Point the interpreter at a resource tree found next to the inputs.
    pub local_resources: bool,
    /// Directory name probed next to each input directory in local mode.
    pub resource_dir: PathBuf,
    /// Interpreter string define that receives the resource path.
    pub resource_define: String,
    /// Path appended to the probed resource directory.
    pub resource_suffix: PathBuf,
    /// Vector interpreter executable.
    pub interpreter: String,
    /// Rasterization resolution in dots per inch.
    pub resolution: u32,
    /// Keep only the top-N pages in the report; 0 keeps all.
    pub max_results: usize,
    /// Regular expression a file name must match to count as a page.
    pub page_pattern: String,
    /// Comparison backend.
    pub backend: BackendKind,
    /// External diff executable used by the ImageMagick backend.
    pub diff_tool: String,
    /// How pyramid levels are combined.
    pub level_weighting: LevelWeighting,
    /// Clamp and log out-of-range multi-scale values instead of failing.
    pub clamp_range_faults: bool,
    /// Extra logging, including per-page progress from the interpreter.
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            render_jobs: cpus,
            compare_jobs: cpus,
            batch: true,
            local_resources: false,
            resource_dir: PathBuf::from("share"),
            resource_define: "lilypond-datadir".into(),
            resource_suffix: PathBuf::from("lilypond/current"),
            interpreter: "gs".into(),
            resolution: 101,
            max_results: 0,
            page_pattern: DEFAULT_PAGE_PATTERN.into(),
            backend: BackendKind::MultiResolution,
            diff_tool: "compare".into(),
            level_weighting: LevelWeighting::Uniform,
            clamp_range_faults: false,
            verbose: false,
        }
    }
}

impl RunConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProofdiffError::file_op("read config", path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could work with.
    pub fn validate(&self) -> Result<()> {
        if self.render_jobs == 0 {
            return Err(ProofdiffError::Config("render_jobs must be at least 1".into()));
        }
        if self.compare_jobs == 0 {
            return Err(ProofdiffError::Config("compare_jobs must be at least 1".into()));
        }
        if self.resolution == 0 {
            return Err(ProofdiffError::Config("resolution must be positive".into()));
        }
        if let LevelWeighting::Geometric { ratio } = self.level_weighting {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err(ProofdiffError::Config(format!(
                    "level weighting ratio must be positive, got {ratio}"
                )));
            }
        }
        self.page_regex()?;
        Ok(())
    }

    /// Compile the page pattern.
    pub fn page_regex(&self) -> Result<Regex> {
        Ok(Regex::new(&self.page_pattern)?)
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RunConfig::default();
        config.validate().expect("defaults must validate");
        assert!(config.batch);
        assert_eq!(config.resolution, 101);
        assert_eq!(config.backend, BackendKind::MultiResolution);
    }

    #[test]
    fn default_pattern_matches_page_files() {
        let re = RunConfig::default().page_regex().unwrap();
        assert!(re.is_match("score-12.eps"));
        assert!(re.is_match("score-1.png"));
        assert!(!re.is_match("score.png"));
        assert!(!re.is_match("score-1xpng"));
    }

    #[test]
    fn zero_jobs_rejected() {
        let config = RunConfig {
            compare_jobs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ProofdiffError::Config(_))));
    }

    #[test]
    fn bad_pattern_rejected() {
        let config = RunConfig {
            page_pattern: "(".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ProofdiffError::Pattern(_))));
    }

    #[test]
    fn load_partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proofdiff.json");
        std::fs::write(
            &path,
            r#"{
                "max_results": 25,
                "backend": "image-magick",
                "level_weighting": { "kind": "geometric", "ratio": 0.5 }
            }"#,
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.max_results, 25);
        assert_eq!(config.backend, BackendKind::ImageMagick);
        assert_eq!(
            config.level_weighting,
            LevelWeighting::Geometric { ratio: 0.5 }
        );
        assert_eq!(config.interpreter, "gs");
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = RunConfig::load("/nonexistent/proofdiff.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/proofdiff.json"));
    }
}
