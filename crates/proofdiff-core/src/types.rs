// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for a proofdiff run: pages, their comparison state, and
// the tunables shared by the image and render crates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProofdiffError;

/// Which of the two compared runs a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// The baseline run (first input directory).
    Old,
    /// The run under test (second input directory).
    New,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Old, Side::New];

    /// Index into per-side arrays; also the digit used in output file names.
    pub fn index(self) -> usize {
        match self {
            Self::Old => 0,
            Self::New => 1,
        }
    }
}

/// How a page file is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageFormat {
    /// Encapsulated PostScript, needs rasterizing before comparison.
    Vector,
    /// PNG, ready for comparison.
    Raster,
}

impl PageFormat {
    /// Infer the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "eps" | "ps" => Some(Self::Vector),
            "png" => Some(Self::Raster),
            _ => None,
        }
    }

    /// Infer the format from a path's extension.
    pub fn of_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Which comparison backend a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Built-in multi-resolution box-filter diff.
    MultiResolution,
    /// ImageMagick `compare -metric MAE`, one process per page pair.
    ImageMagick,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultiResolution => write!(f, "multi-resolution"),
            Self::ImageMagick => write!(f, "image-magick"),
        }
    }
}

/// How pyramid levels are combined into the per-pixel multi-scale diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum LevelWeighting {
    /// Plain arithmetic mean over all levels.
    #[default]
    Uniform,
    /// Level `k` weighs `ratio^k`; the weights are normalised to sum to one.
    /// A ratio above 1 favours coarse levels, below 1 fine ones.
    Geometric { ratio: f64 },
}

impl LevelWeighting {
    /// Normalised weights for `levels` pyramid levels.
    pub fn weights(&self, levels: usize) -> Vec<f64> {
        let raw: Vec<f64> = match *self {
            Self::Uniform => vec![1.0; levels],
            Self::Geometric { ratio } => (0..levels).map(|k| ratio.powi(k as i32)).collect(),
        };
        let total: f64 = raw.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return vec![1.0 / levels.max(1) as f64; levels];
        }
        raw.into_iter().map(|w| w / total).collect()
    }
}

/// One page's comparison job.
///
/// Created by discovery, owned by exactly one worker while it is compared, and
/// read back by the coordinator afterwards.
#[derive(Debug, Default)]
pub struct PageTask {
    /// Shared file stem, e.g. `score-3`.
    pub name: String,
    /// Input file per side (`[old, new]`); `None` when the page is missing.
    pub inputs: [Option<PathBuf>; 2],
    /// Where the visualization goes, set when the task is scheduled.
    pub diff_path: Option<PathBuf>,
    /// Multi-scale (or external tool) distance, set once compared.
    pub distance: Option<f64>,
    /// Pointwise mean absolute error, when the backend computes it.
    pub mae: Option<f64>,
    /// Failure recorded by the worker that processed this task.
    pub error: Option<ProofdiffError>,
}

impl PageTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Input path for one side.
    pub fn input(&self, side: Side) -> Option<&Path> {
        self.inputs[side.index()].as_deref()
    }

    /// Both inputs are present, so the page can be compared.
    pub fn is_diffable(&self) -> bool {
        self.inputs.iter().all(Option::is_some)
    }

    /// Both inputs as a pair, when the page is diffable.
    pub fn input_pair(&self) -> Option<(&Path, &Path)> {
        Some((self.input(Side::Old)?, self.input(Side::New)?))
    }
}

/// The full set of pages in a run plus the two input roots.
///
/// Only the coordinating thread mutates this; workers receive individual
/// [`PageTask`]s moved out of it.
#[derive(Debug, Default)]
pub struct CompareResult {
    /// All pages keyed by name.
    pub pages: BTreeMap<String, PageTask>,
    /// `[old, new]` input directories.
    pub dirs: [PathBuf; 2],
    /// Names of the ranked pages, most different first. Filled by ranking.
    pub ranked: Vec<String>,
}

impl CompareResult {
    pub fn new(old_dir: impl Into<PathBuf>, new_dir: impl Into<PathBuf>) -> Self {
        Self {
            pages: BTreeMap::new(),
            dirs: [old_dir.into(), new_dir.into()],
            ranked: Vec::new(),
        }
    }

    /// Record `path` as the input of page `name` on `side`.
    ///
    /// A raster already recorded for that side is kept over a vector file, so
    /// pre-rendered pages are not rendered again.
    pub fn insert(&mut self, name: &str, side: Side, path: PathBuf) {
        let task = self
            .pages
            .entry(name.to_owned())
            .or_insert_with(|| PageTask::new(name));
        let slot = &mut task.inputs[side.index()];
        let keep_existing = slot
            .as_deref()
            .is_some_and(|p| PageFormat::of_path(p) == Some(PageFormat::Raster));
        if !keep_existing {
            *slot = Some(path);
        }
    }

    /// Number of pages present on both sides.
    pub fn diffable_count(&self) -> usize {
        self.pages.values().filter(|t| t.is_diffable()).count()
    }

    /// Pages present on only one side.
    pub fn one_sided(&self) -> impl Iterator<Item = &PageTask> {
        self.pages.values().filter(|t| !t.is_diffable())
    }

    /// Ranked pages in rank order.
    pub fn ranked_pages(&self) -> impl Iterator<Item = &PageTask> {
        self.ranked.iter().filter_map(|name| self.pages.get(name))
    }
}

// -- Tests --------------------------------------------------------------------
