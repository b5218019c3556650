// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// proofdiff-compare: Run orchestration for proofdiff.
//
// Pairs page files between two runs, rasterizes vector pages, compares every
// pair on a fixed worker pool, and ranks the results into a listing and an
// HTML gallery.

pub mod discovery;
pub mod pipeline;
pub mod report;
pub mod scheduler;

pub use discovery::discover;
pub use pipeline::Pipeline;
pub use scheduler::{CompareSummary, Scheduler};
