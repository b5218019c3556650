// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// proofdiff-image: Raster comparison for proofdiff.
//
// Provides signed difference images with summed-area tables, the
// multi-resolution perceptual diff built on them, a pointwise MAE metric, and
// the pluggable compare backends (built-in and ImageMagick).

pub mod backend;
pub mod mae;
pub mod multires;
pub mod raster;
pub mod signed;

pub use backend::{CompareBackend, Comparison, ImageMagickBackend, MultiResolutionBackend};
pub use multires::{DiffOutcome, DiffPyramid, MultiResolutionDiff};
pub use raster::{Raster, Rect, WhitePadded};
pub use signed::{IntegralImage, SignedImage};
