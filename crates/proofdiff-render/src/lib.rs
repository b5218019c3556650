// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// proofdiff-render: Vector page rasterization.
//
// Encapsulated PostScript pages are turned into PNGs by an external
// Ghostscript interpreter, one driver script per worker batch. Pages whose
// bounding box is degenerate are swapped for a blank placeholder so they still
// produce a (blank) raster.

pub mod bbox;
pub mod ghostscript;

pub use bbox::BoundingBox;
pub use ghostscript::{Rasterizer, RenderSummary};
