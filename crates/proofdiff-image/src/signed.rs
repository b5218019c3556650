// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signed difference images and their summed-area tables.
//
// A `SignedImage` holds one real sample per pixel (normally in [-1, 1]) and
// reads as zero outside its rectangle. An `IntegralImage` built over it answers
// any axis-aligned box sum with four lookups, which is what makes box filters
// at every radius of the diff pyramid cost the same.

use crate::raster::Rect;

/// Real-valued samples over a rectangle, zero outside.
#[derive(Debug, Clone)]
pub struct SignedImage {
    rect: Rect,
    samples: Vec<f64>,
}

impl SignedImage {
    /// All-zero image covering `rect`.
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            samples: vec![0.0; rect.area()],
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Store `v` at `(x, y)`. Writes outside the rectangle are ignored.
    pub fn set(&mut self, x: i32, y: i32, v: f64) {
        if self.rect.contains(x, y) {
            let idx = self.rect.offset(x, y);
            self.samples[idx] = v;
        }
    }

    /// Sample at `(x, y)`, or 0 outside the rectangle.
    pub fn val(&self, x: i32, y: i32) -> f64 {
        if self.rect.contains(x, y) {
            self.samples[self.rect.offset(x, y)]
        } else {
            0.0
        }
    }

    /// Mean absolute sample value; 0 for an empty image.
    pub fn avg_abs(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|v| v.abs()).sum::<f64>() / self.samples.len() as f64
    }

    pub(crate) fn samples(&self) -> &[f64] {
        &self.samples
    }
}

/// Summed-area table: each cell holds the sum of all samples at or above-left
/// of it. Immutable once built.
#[derive(Debug, Clone)]
pub struct IntegralImage {
    rect: Rect,
    sums: Vec<f64>,
}

impl IntegralImage {
    /// Build the table in a single row-major pass using
    /// `S(x,y) = D(x,y) + S(x-1,y) + S(x,y-1) - S(x-1,y-1)`.
    pub fn new(src: &SignedImage) -> Self {
        let rect = src.rect();
        let w = rect.width();
        let h = rect.height();
        let data = src.samples();
        let mut sums = vec![0.0; w * h];

        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                let left = if x > 0 { sums[idx - 1] } else { 0.0 };
                let up = if y > 0 { sums[idx - w] } else { 0.0 };
                let diag = if x > 0 && y > 0 { sums[idx - w - 1] } else { 0.0 };
                sums[idx] = data[idx] + left + up - diag;
            }
        }

        Self { rect, sums }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Cumulative sum up to `(x, y)` inclusive.
    ///
    /// Points left of or above the rectangle give 0; points right of or below
    /// it are clamped to the last column/row, so the sum over the whole image
    /// is reachable from any far corner.
    pub fn val(&self, x: i32, y: i32) -> f64 {
        let r = self.rect;
        if r.is_empty() || x < r.min_x || y < r.min_y {
            return 0.0;
        }
        let cx = x.min(r.max_x - 1);
        let cy = y.min(r.max_y - 1);
        self.sums[r.offset(cx, cy)]
    }

    /// Sum of the source samples over `[x-r, x+r] × [y-r, y+r]`, treating
    /// samples outside the source rectangle as zero.
    pub fn box_sum(&self, x: i32, y: i32, r: i32) -> f64 {
        let (x0, y0) = (x - r - 1, y - r - 1);
        let (x1, y1) = (x + r, y + r);
        self.val(x1, y1) - self.val(x0, y1) - self.val(x1, y0) + self.val(x0, y0)
    }
}

// -- Tests --------------------------------------------------------------------
