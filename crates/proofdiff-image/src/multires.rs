// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-resolution perceptual diff.
//
// A pointwise pixel diff over-penalises anti-aliasing and sub-pixel glyph
// jitter. Here the signed brightness difference is box-filtered at radii 1, 2,
// 4, ... and the per-pixel score is the mean over all those scales, so thin
// high-frequency noise cancels out while real layout changes, which have
// support at every scale, dominate.

use image::{Rgba, RgbaImage};
use proofdiff_core::error::{ProofdiffError, Result};
use proofdiff_core::types::LevelWeighting;
use tracing::{debug, instrument, warn};

use crate::raster::{Raster, Rect};
use crate::signed::{IntegralImage, SignedImage};

/// Float slack tolerated above |1| before a sample counts as out of range.
const RANGE_EPSILON: f64 = 1e-9;

/// Signed brightness difference of two rasters over the union of their
/// bounds, in [-1, 1]: positive where `a` carries more ink than `b`, i.e.
/// `(ΣRGB(b) − ΣRGB(a)) / (3·255)`. Alpha is ignored.
pub fn base_diff(a: &Raster, b: &Raster) -> SignedImage {
    let union = a.bounds().union(&b.bounds());
    let (pa, pb) = (a.white_padded(), b.white_padded());
    let mut diff = SignedImage::new(union);
    for (x, y) in union.points() {
        let v = (pb.rgb_sum(x, y) as f64 - pa.rgb_sum(x, y) as f64) / (3.0 * 255.0);
        diff.set(x, y, v);
    }
    diff
}

/// Box-filter radii for an image of the given size: 1, 2, 4, ... while the
/// radius stays below the larger side.
pub fn pyramid_radii(width: usize, height: usize) -> Vec<i32> {
    let limit = width.max(height) as i64;
    let mut radii = Vec::new();
    let mut delta: i64 = 1;
    while delta < limit {
        radii.push(delta as i32);
        delta *= 2;
    }
    radii
}

/// Box-filtered views of a base diff, derived on demand from its integral
/// image. Level 0 is the base diff itself.
pub struct DiffPyramid<'a> {
    base: &'a SignedImage,
    integral: &'a IntegralImage,
    radii: Vec<i32>,
}

impl<'a> DiffPyramid<'a> {
    pub fn new(base: &'a SignedImage, integral: &'a IntegralImage) -> Self {
        let rect = base.rect();
        Self {
            base,
            integral,
            radii: pyramid_radii(rect.width(), rect.height()),
        }
    }

    /// Number of levels, the base included.
    pub fn levels(&self) -> usize {
        1 + self.radii.len()
    }

    /// Window radius of `level` (0 for the base).
    pub fn radius(&self, level: usize) -> i32 {
        if level == 0 { 0 } else { self.radii[level - 1] }
    }

    /// Value of `level` at `(x, y)`: the mean of the base diff over the
    /// `(2δ+1)²` window, out-of-rect samples counting as zero.
    pub fn val(&self, level: usize, x: i32, y: i32) -> f64 {
        if level == 0 {
            return self.base.val(x, y);
        }
        let delta = self.radius(level);
        let side = (2 * delta + 1) as f64;
        self.integral.box_sum(x, y, delta) / (side * side)
    }

    /// Materialise one level as its own image.
    pub fn level(&self, level: usize) -> SignedImage {
        let rect = self.base.rect();
        let mut out = SignedImage::new(rect);
        for (x, y) in rect.points() {
            out.set(x, y, self.val(level, x, y));
        }
        out
    }

    /// Weighted mean across all levels at `(x, y)`.
    pub fn combined(&self, weights: &[f64], x: i32, y: i32) -> f64 {
        weights
            .iter()
            .enumerate()
            .map(|(level, w)| w * self.val(level, x, y))
            .sum()
    }
}

/// Result of comparing two rasters.
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    /// Per-pixel multi-scale diff over the union rectangle.
    pub multiscale: SignedImage,
    /// Red/green visualization of `multiscale`, positioned at the union origin.
    pub visualization: Raster,
    /// Mean absolute multi-scale diff, in [0, 1].
    pub distance: f64,
    /// Pyramid levels used, the base included.
    pub levels: usize,
}

/// The multi-resolution comparison algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiResolutionDiff {
    weighting: LevelWeighting,
    clamp_range_faults: bool,
}

impl MultiResolutionDiff {
    pub fn new(weighting: LevelWeighting) -> Self {
        Self {
            weighting,
            clamp_range_faults: false,
        }
    }

    /// Clamp out-of-range samples with a warning instead of failing.
    pub fn clamp_range_faults(mut self, clamp: bool) -> Self {
        self.clamp_range_faults = clamp;
        self
    }

    /// Compare `a` against `b`. `page` only tags diagnostics and errors.
    #[instrument(skip(self, a, b))]
    pub fn compare(&self, page: &str, a: &Raster, b: &Raster) -> Result<DiffOutcome> {
        let base = base_diff(a, b);
        let integral = IntegralImage::new(&base);
        let pyramid = DiffPyramid::new(&base, &integral);
        let weights = self.weighting.weights(pyramid.levels());

        let rect = base.rect();
        let mut multiscale = SignedImage::new(rect);
        let mut total = 0.0;
        for (x, y) in rect.points() {
            let v = self.checked(page, x, y, pyramid.combined(&weights, x, y))?;
            total += v.abs();
            multiscale.set(x, y, v);
        }

        let distance = if rect.is_empty() {
            0.0
        } else {
            total / rect.area() as f64
        };
        debug!(
            base_avg_abs = base.avg_abs(),
            levels = pyramid.levels(),
            distance,
            "Multi-resolution diff computed"
        );

        Ok(DiffOutcome {
            visualization: visualize(&multiscale),
            multiscale,
            distance,
            levels: pyramid.levels(),
        })
    }

    /// Enforce |v| <= 1, the invariant of a weighted mean of values in [-1, 1].
    fn checked(&self, page: &str, x: i32, y: i32, v: f64) -> Result<f64> {
        if v.abs() <= 1.0 + RANGE_EPSILON {
            return Ok(v.clamp(-1.0, 1.0));
        }
        if self.clamp_range_faults {
            warn!(page, x, y, value = v, "Multi-scale diff out of range, clamping");
            return Ok(v.clamp(-1.0, 1.0));
        }
        Err(ProofdiffError::RangeViolation {
            page: page.to_owned(),
            x,
            y,
            value: v,
        })
    }
}

/// Colour a signed diff: red where the first image is darker, green where the
/// second is. Alpha is `255·sqrt(|d|)` so faint differences stay visible.
pub fn visualize(diff: &SignedImage) -> Raster {
    let rect: Rect = diff.rect();
    let mut img = RgbaImage::new(rect.width() as u32, rect.height() as u32);
    for (x, y) in rect.points() {
        let d = diff.val(x, y);
        if d == 0.0 {
            continue;
        }
        let alpha = (255.0 * d.abs().min(1.0).sqrt()).round() as u8;
        let px = if d > 0.0 {
            Rgba([255, 0, 0, alpha])
        } else {
            Rgba([0, 255, 0, alpha])
        };
        img.put_pixel((x - rect.min_x) as u32, (y - rect.min_y) as u32, px);
    }
    Raster::with_origin(img, (rect.min_x, rect.min_y))
}

// -- Tests --------------------------------------------------------------------
