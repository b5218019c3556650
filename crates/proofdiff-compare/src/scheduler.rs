// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallel compare scheduler.
//
// Every diffable page is moved out of the `CompareResult` onto a closed task
// queue; a fixed pool of worker threads drains it, each worker owning the task
// it is comparing, and hands finished tasks back on a completion queue. Only
// the coordinating thread touches the `CompareResult`. Failures are recorded
// per task and never stop the other workers; the run as a whole fails
// afterwards if any page did.

use std::path::Path;
use std::time::{Duration, Instant};

use proofdiff_core::error::{ProofdiffError, Result};
use proofdiff_core::types::{CompareResult, PageTask};
use proofdiff_image::CompareBackend;
use tracing::{debug, error, info, instrument, warn};

/// Totals for one comparison phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareSummary {
    /// Page pairs compared.
    pub scheduled: usize,
    /// Page pairs whose comparison failed.
    pub failed: usize,
    /// Worker threads used.
    pub jobs: usize,
    pub elapsed: Duration,
}

/// Fans page comparisons out over a fixed number of worker threads.
pub struct Scheduler<'a> {
    backend: &'a dyn CompareBackend,
    jobs: usize,
}

impl<'a> Scheduler<'a> {
    pub fn new(backend: &'a dyn CompareBackend, jobs: usize) -> Self {
        Self {
            backend,
            jobs: jobs.max(1),
        }
    }

    /// Compare every diffable page of `result`, writing visualizations to
    /// `<out_dir>/<name>.diff.png`.
    ///
    /// All pages are attempted. If any failed, the first failure in page-name
    /// order is returned after every task has finished; per-page results,
    /// errors included, stay on the tasks in `result`.
    #[instrument(skip_all, fields(backend = self.backend.name(), jobs = self.jobs))]
    pub fn run(&self, result: &mut CompareResult, out_dir: &Path) -> Result<CompareSummary> {
        let start = Instant::now();

        let names: Vec<String> = result
            .pages
            .values()
            .filter(|t| t.is_diffable())
            .map(|t| t.name.clone())
            .collect();
        let scheduled = names.len();

        let (task_tx, task_rx) = flume::bounded::<PageTask>(scheduled.max(1));
        for name in &names {
            if let Some(mut task) = result.pages.remove(name) {
                task.diff_path = Some(out_dir.join(format!("{name}.diff.png")));
                task_tx
                    .send(task)
                    .map_err(|_| ProofdiffError::Config("compare queue closed early".into()))?;
            }
        }
        drop(task_tx);

        let workers = self.jobs.min(scheduled).max(1);
        let (done_tx, done_rx) = flume::bounded::<PageTask>(scheduled.max(1));
        std::thread::scope(|scope| -> Result<()> {
            for worker in 0..workers {
                let tasks = task_rx.clone();
                let done = done_tx.clone();
                let backend = self.backend;
                std::thread::Builder::new()
                    .name(format!("compare-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        for mut task in tasks.iter() {
                            compare_one(backend, &mut task);
                            if done.send(task).is_err() {
                                break;
                            }
                        }
                    })?;
            }
            drop(done_tx);

            for _ in 0..scheduled {
                let Ok(task) = done_rx.recv() else {
                    break;
                };
                result.pages.insert(task.name.clone(), task);
            }
            Ok(())
        })?;

        let failed: Vec<&PageTask> = result.pages.values().filter(|t| t.error.is_some()).collect();
        let summary = CompareSummary {
            scheduled,
            failed: failed.len(),
            jobs: workers,
            elapsed: start.elapsed(),
        };
        info!(
            pairs = summary.scheduled,
            failed = summary.failed,
            jobs = summary.jobs,
            elapsed = ?summary.elapsed,
            per_pair = ?(summary.elapsed / (1 + summary.scheduled as u32)),
            "Compared page pairs"
        );

        for task in &failed {
            if let Some(err) = &task.error {
                error!(page = %task.name, error = %err, "Page comparison failed");
            }
        }
        match failed.first() {
            Some(task) => Err(ProofdiffError::Page {
                name: task.name.clone(),
                detail: task
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            }),
            None => Ok(summary),
        }
    }
}

/// Run one comparison, recording the outcome on the task itself.
fn compare_one(backend: &dyn CompareBackend, task: &mut PageTask) {
    if let Err(err) = try_compare(backend, task) {
        warn!(page = %task.name, error = %err, "Comparison failed");
        task.error = Some(err);
    }
}

fn try_compare(backend: &dyn CompareBackend, task: &mut PageTask) -> Result<()> {
    let diff_path = task
        .diff_path
        .clone()
        .ok_or_else(|| ProofdiffError::Config(format!("page {} has no diff path", task.name)))?;
    let comparison = {
        let (old, new) = task
            .input_pair()
            .ok_or_else(|| ProofdiffError::Config(format!("page {} is one-sided", task.name)))?;
        backend.compare(&task.name, old, new, &diff_path)?
    };
    task.distance = Some(comparison.distance);
    task.mae = comparison.mae;
    debug!(page = %task.name, distance = comparison.distance, mae = ?comparison.mae, "Page compared");

    // Identical pages get no diff file.
    if comparison.distance > 0.0 {
        if let Some(vis) = comparison.visualization {
            if let Some(parent) = diff_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ProofdiffError::file_op("create dir", parent, e))?;
            }
            vis.save_png(&diff_path)?;
        }
    }
    Ok(())
}

// -- Tests --------------------------------------------------------------------
