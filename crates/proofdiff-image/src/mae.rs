// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pointwise mean absolute error, reported next to the multi-scale distance as
// a cross-check.

use crate::raster::Raster;

/// Mean absolute per-channel error over R, G, B and A, normalised to [0, 1].
///
/// Covers the union of both bounds; pixels outside a raster read as opaque
/// white. Two empty rasters score 0.
pub fn mean_absolute_error(a: &Raster, b: &Raster) -> f64 {
    let union = a.bounds().union(&b.bounds());
    if union.is_empty() {
        return 0.0;
    }
    let (pa, pb) = (a.white_padded(), b.white_padded());
    let total: u64 = union
        .points()
        .map(|(x, y)| {
            let (p, q) = (pa.get(x, y), pb.get(x, y));
            p.0.iter()
                .zip(q.0.iter())
                .map(|(&c1, &c2)| c1.abs_diff(c2) as u64)
                .sum::<u64>()
        })
        .sum();
    total as f64 / (union.area() as f64 * 4.0 * 255.0)
}
