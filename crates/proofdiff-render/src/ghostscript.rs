// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallel EPS → PNG conversion through Ghostscript.
//
// Jobs are dealt round-robin to a fixed number of worker threads. Each worker
// writes a PostScript driver script listing one `setdevice ... run` directive
// per page and runs the interpreter on it once, so interpreter start-up is paid
// per batch rather than per page. Conversion is all-or-nothing: the first
// failing worker's error aborts the run.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use proofdiff_core::config::RunConfig;
use proofdiff_core::error::{ProofdiffError, Result};
use proofdiff_core::types::{CompareResult, PageFormat, Side};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::bbox;

/// Stand-in for pages whose bounding box is empty.
const BLANK_EPS: &str = "%!PS-Adobe-3.0 EPSF-3.0\n%%BoundingBox: 0 0 1 1\n%%EndComments\n";

/// Fixed interpreter flags; the driver script and `-c quit` follow.
const GS_FLAGS: &[&str] = &[
    "-dNOSAFER",
    "-dEPSCrop",
    "-q",
    "-dNOPAUSE",
    "-dNODISPLAY",
    "-dAutoRotatePages=/None",
    "-dPrinted=false",
];

/// Totals for one conversion phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    /// Pages converted.
    pub pages: usize,
    /// Worker threads used.
    pub jobs: usize,
    pub elapsed: Duration,
}

/// Runs the external interpreter over batches of vector pages.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    interpreter: String,
    resolution: u32,
    jobs: usize,
    batch: bool,
    local_resources: bool,
    resource_dir: PathBuf,
    resource_define: String,
    resource_suffix: PathBuf,
    verbose: bool,
}

impl Rasterizer {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            resolution: config.resolution,
            jobs: config.render_jobs.max(1),
            batch: config.batch,
            local_resources: config.local_resources,
            resource_dir: config.resource_dir.clone(),
            resource_define: config.resource_define.clone(),
            resource_suffix: config.resource_suffix.clone(),
            verbose: config.verbose,
        }
    }

    /// Rasterize every vector input of `result` into `out_dir`, replacing the
    /// task's input path with `<out_dir>/<name>.<side>.png`.
    #[instrument(skip_all, fields(out_dir = %out_dir.display()))]
    pub fn render_pages(&self, result: &mut CompareResult, out_dir: &Path) -> Result<RenderSummary> {
        let start = Instant::now();
        // One job per (page, side); both sides may name the same input file.
        let mut jobs: Vec<(PathBuf, PathBuf)> = Vec::new();
        for task in result.pages.values_mut() {
            for side in Side::BOTH {
                let slot = &mut task.inputs[side.index()];
                let Some(input) = slot.as_deref() else {
                    continue;
                };
                if PageFormat::of_path(input) != Some(PageFormat::Vector) {
                    continue;
                }
                let output = out_dir.join(format!("{}.{}.png", task.name, side.index()));
                if let Some(input) = slot.replace(output.clone()) {
                    jobs.push((input, output));
                }
            }
        }

        self.convert_parallel(&jobs)?;

        let summary = RenderSummary {
            pages: jobs.len(),
            jobs: self.jobs.min(jobs.len()).max(1),
            elapsed: start.elapsed(),
        };
        info!(
            pages = summary.pages,
            jobs = summary.jobs,
            batch = self.batch,
            elapsed = ?summary.elapsed,
            per_page = ?(summary.elapsed / (1 + summary.pages as u32)),
            "Converted vector pages to PNG"
        );
        Ok(summary)
    }

    /// Convert each `(input, output)` pair, spreading the work over the
    /// configured number of workers.
    pub fn convert_parallel(&self, jobs: &[(PathBuf, PathBuf)]) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let chunks = partition_round_robin(jobs, self.jobs);

        std::thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(chunks.len());
            for (worker, chunk) in chunks.iter().enumerate() {
                let handle = std::thread::Builder::new()
                    .name(format!("gs-worker-{worker}"))
                    .spawn_scoped(scope, move || self.convert_chunk(chunk))?;
                handles.push(handle);
            }

            let mut first_err = None;
            for handle in handles {
                let outcome = handle.join().unwrap_or_else(|_| {
                    Err(ProofdiffError::Interpreter("conversion worker panicked".into()))
                });
                if let Err(err) = outcome {
                    first_err.get_or_insert(err);
                }
            }
            first_err.map_or(Ok(()), Err)
        })
    }

    /// One worker's share: a single batch, or one batch per page when
    /// batching is off.
    fn convert_chunk(&self, chunk: &[(PathBuf, PathBuf)]) -> Result<()> {
        if self.batch {
            return self.convert_batch(chunk);
        }
        for job in chunk {
            self.convert_batch(std::slice::from_ref(job))?;
        }
        Ok(())
    }

    /// Write a driver script for `jobs` and run the interpreter on it once.
    fn convert_batch(&self, jobs: &[(PathBuf, PathBuf)]) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let resource_arg = self.resource_arg(jobs)?;

        let mut placeholder = NamedTempFile::new()?;
        placeholder.write_all(BLANK_EPS.as_bytes())?;
        placeholder.flush()?;

        let mut driver = NamedTempFile::new()?;
        self.write_driver(jobs, placeholder.path(), &mut driver)?;
        driver.flush()?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.args(GS_FLAGS);
        if let Some(arg) = &resource_arg {
            cmd.arg(arg);
        }
        cmd.arg(driver.path()).args(["-c", "quit"]);
        debug!(command = ?cmd, pages = jobs.len(), "Running interpreter");

        let status = self.run_interpreter(&mut cmd)?.0;
        if !status.success() {
            return Err(ProofdiffError::Interpreter(format!(
                "{} exited with {status} on a batch of {} page(s) starting with {}",
                self.interpreter,
                jobs.len(),
                jobs[0].0.display()
            )));
        }
        Ok(())
    }

    /// Run `cmd` with its stdout relayed line by line into the log, so
    /// interpreter chatter never reaches the process's own stdout. Returns
    /// the exit status and the relayed lines.
    fn run_interpreter(&self, cmd: &mut Command) -> Result<(ExitStatus, Vec<String>)> {
        let spawn_err =
            |e: io::Error| ProofdiffError::Interpreter(format!("cannot run {}: {e}", self.interpreter));
        let mut child = cmd.stdout(Stdio::piped()).spawn().map_err(spawn_err)?;

        let mut lines = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(io::Result::ok) {
                info!(interpreter = %self.interpreter, "{line}");
                lines.push(line);
            }
        }
        let status = child.wait().map_err(spawn_err)?;
        Ok((status, lines))
    }

    /// Emit one directive per job, routing degenerate pages to `placeholder`.
    pub fn write_driver(
        &self,
        jobs: &[(PathBuf, PathBuf)],
        placeholder: &Path,
        w: &mut impl Write,
    ) -> Result<()> {
        for (input, output) in jobs {
            let source = if bbox::is_degenerate(input)? {
                debug!(input = %input.display(), "Degenerate bounding box, rendering blank page");
                placeholder
            } else {
                input.as_path()
            };
            write_directive(w, source, output, self.resolution, self.verbose.then_some(input.as_path()))?;
        }
        Ok(())
    }

    /// Interpreter flag pointing at a resource tree next to the inputs, when
    /// local mode is on and such a tree exists. The first hit wins.
    pub fn resource_arg(&self, jobs: &[(PathBuf, PathBuf)]) -> Result<Option<String>> {
        if !self.local_resources {
            return Ok(None);
        }
        let mut probed: HashSet<&Path> = HashSet::new();
        for (input, _) in jobs {
            let dir = match input.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            if !probed.insert(dir) {
                continue;
            }
            let candidate = dir.join(&self.resource_dir);
            match std::fs::metadata(&candidate) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ProofdiffError::file_op("stat", candidate, e)),
                Ok(meta) if meta.is_dir() => {
                    let abs = std::fs::canonicalize(&candidate)
                        .map_err(|e| ProofdiffError::file_op("resolve", &candidate, e))?;
                    let target = abs.join(&self.resource_suffix);
                    return Ok(Some(format!("-s{}={}", self.resource_define, target.display())));
                }
                Ok(_) => continue,
            }
        }
        Ok(None)
    }
}

/// Deal `items` to `workers` buckets in turn. Never returns more buckets than
/// items, and always at least one.
pub fn partition_round_robin<T: Clone>(items: &[T], workers: usize) -> Vec<Vec<T>> {
    let n = workers.max(1).min(items.len().max(1));
    let mut buckets = vec![Vec::new(); n];
    for (i, item) in items.iter().enumerate() {
        buckets[i % n].push(item.clone());
    }
    buckets
}

/// One rasterization directive. With `announce`, the interpreter prints the
/// original page name before rendering it.
pub fn write_directive(
    w: &mut impl Write,
    input: &Path,
    output: &Path,
    dpi: u32,
    announce: Option<&Path>,
) -> io::Result<()> {
    if let Some(page) = announce {
        writeln!(w, "({}\\n) print", ps_escape(&page.to_string_lossy()))?;
    }
    writeln!(w, "mark /OutputFile ({})", ps_escape(&output.to_string_lossy()))?;
    writeln!(w, "/GraphicsAlphaBits 4 /TextAlphaBits 4")?;
    writeln!(w, "/HWResolution [{dpi} {dpi}]")?;
    writeln!(w, "(png16m) finddevice putdeviceprops setdevice")?;
    writeln!(w, "({}) run", ps_escape(&input.to_string_lossy()))?;
    Ok(())
}

/// Escape text for a PostScript `( ... )` string literal.
pub fn ps_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_EPS: &str = "%!PS-Adobe-3.0 EPSF-3.0\n%%BoundingBox: 0 0 100 50\n%%EndComments\nshowpage\n";
    const EMPTY_EPS: &str = "%!PS-Adobe-3.0 EPSF-3.0\n%%BoundingBox: 0 0 0 0\n%%EndComments\n";

    fn rasterizer(interpreter: &str) -> Rasterizer {
        Rasterizer::from_config(&RunConfig {
            interpreter: interpreter.into(),
            render_jobs: 2,
            ..Default::default()
        })
    }

    #[test]
    fn round_robin_partition() {
        let parts = partition_round_robin(&[0, 1, 2, 3, 4], 2);
        assert_eq!(parts, vec![vec![0, 2, 4], vec![1, 3]]);
        assert_eq!(partition_round_robin(&[7], 8), vec![vec![7]]);
        assert_eq!(partition_round_robin::<u8>(&[], 3), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn directive_lists_device_settings() {
        let mut buf = Vec::new();
        write_directive(
            &mut buf,
            Path::new("in/p-1.eps"),
            Path::new("out/p-1.0.png"),
            101,
            None,
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "mark /OutputFile (out/p-1.0.png)\n\
             /GraphicsAlphaBits 4 /TextAlphaBits 4\n\
             /HWResolution [101 101]\n\
             (png16m) finddevice putdeviceprops setdevice\n\
             (in/p-1.eps) run\n"
        );
    }

    #[test]
    fn verbose_directive_announces_page() {
        let mut buf = Vec::new();
        let page = PathBuf::from("in/p-1.eps");
        write_directive(&mut buf, &page, Path::new("o.png"), 72, Some(page.as_path())).unwrap();
        assert!(String::from_utf8(buf).unwrap().starts_with("(in/p-1.eps\\n) print\n"));
    }

    #[test]
    fn escape_parens_and_backslashes() {
        assert_eq!(ps_escape(r"a(b)\c"), r"a\(b\)\\c");
    }

    #[test]
    fn driver_substitutes_degenerate_pages() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good-1.eps");
        let empty = dir.path().join("empty-2.eps");
        std::fs::write(&good, GOOD_EPS).unwrap();
        std::fs::write(&empty, EMPTY_EPS).unwrap();
        let placeholder = dir.path().join("blank.eps");

        let jobs = vec![
            (good.clone(), dir.path().join("good-1.0.png")),
            (empty.clone(), dir.path().join("empty-2.0.png")),
        ];
        let mut buf = Vec::new();
        rasterizer("gs")
            .write_driver(&jobs, &placeholder, &mut buf)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains(&format!("({}) run", good.display())));
        assert!(!text.contains(&format!("({}) run", empty.display())));
        assert!(text.contains(&format!("({}) run", placeholder.display())));
        assert!(text.contains("empty-2.0.png"));
    }

    #[test]
    fn driver_rejects_missing_bounding_box() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad-1.eps");
        std::fs::write(&bad, "%!PS\nshowpage\n").unwrap();
        let jobs = vec![(bad, dir.path().join("bad-1.0.png"))];
        let err = rasterizer("gs")
            .write_driver(&jobs, Path::new("blank.eps"), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ProofdiffError::BoundingBox { .. }));
    }

    #[test]
    fn local_resource_dir_is_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("share")).unwrap();
        let jobs = vec![(dir.path().join("p-1.eps"), dir.path().join("p-1.0.png"))];

        let mut r = rasterizer("gs");
        assert_eq!(r.resource_arg(&jobs).unwrap(), None);

        r.local_resources = true;
        let arg = r.resource_arg(&jobs).unwrap().expect("share dir exists");
        let share = std::fs::canonicalize(dir.path().join("share")).unwrap();
        assert_eq!(
            arg,
            format!("-slilypond-datadir={}", share.join("lilypond/current").display())
        );
    }

    #[test]
    fn local_resource_dir_absent() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![(dir.path().join("p-1.eps"), dir.path().join("p-1.0.png"))];
        let mut r = rasterizer("gs");
        r.local_resources = true;
        assert_eq!(r.resource_arg(&jobs).unwrap(), None);
    }

    #[test]
    fn empty_job_set_is_noop() {
        rasterizer("/nonexistent/gs").convert_parallel(&[]).unwrap();
    }

    #[test]
    fn missing_interpreter_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("p-1.eps");
        std::fs::write(&input, GOOD_EPS).unwrap();
        let jobs = vec![(input, dir.path().join("p-1.0.png"))];

        let err = rasterizer("/nonexistent/gs")
            .convert_parallel(&jobs)
            .unwrap_err();
        assert!(matches!(err, ProofdiffError::Interpreter(_)));
    }

    #[cfg(unix)]
    #[test]
    fn failing_interpreter_aborts_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let mut jobs = Vec::new();
        for i in 1..=4 {
            let input = dir.path().join(format!("p-{i}.eps"));
            std::fs::write(&input, GOOD_EPS).unwrap();
            jobs.push((input, dir.path().join(format!("p-{i}.0.png"))));
        }
        let err = rasterizer("false").convert_parallel(&jobs).unwrap_err();
        assert!(matches!(err, ProofdiffError::Interpreter(msg) if msg.contains("exited")));
    }

    #[cfg(unix)]
    #[test]
    fn render_pages_rewrites_vector_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let eps = dir.path().join("p-1.eps");
        std::fs::write(&eps, GOOD_EPS).unwrap();

        let mut result = CompareResult::new(dir.path(), dir.path());
        result.insert("p-1", Side::Old, eps);
        result.insert("p-1", Side::New, dir.path().join("p-1.png"));

        // `true` accepts any arguments and succeeds without writing output.
        let mut r = rasterizer("true");
        r.batch = false;
        let summary = r.render_pages(&mut result, &out).unwrap();
        assert_eq!(summary.pages, 1);
        assert_eq!(
            result.pages["p-1"].input(Side::Old),
            Some(out.join("p-1.0.png").as_path())
        );
        assert_eq!(
            result.pages["p-1"].input(Side::New),
            Some(dir.path().join("p-1.png").as_path())
        );
    }

    /// Interpreter stand-in that appends each driver script it is given to
    /// `log`. The driver follows the fixed flags.
    #[cfg(unix)]
    fn recording_interpreter(dir: &Path, log: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-gs");
        let driver_arg = GS_FLAGS.len() + 1;
        std::fs::write(
            &script,
            format!("#!/bin/sh\ncat \"${{{driver_arg}}}\" >> '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn same_file_on_both_sides_renders_twice() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let eps = dir.path().join("p-1.eps");
        std::fs::write(&eps, GOOD_EPS).unwrap();
        let log = dir.path().join("drivers.log");

        let mut result = CompareResult::new(dir.path(), dir.path());
        result.insert("p-1", Side::Old, eps.clone());
        result.insert("p-1", Side::New, eps);

        let r = rasterizer(&recording_interpreter(dir.path(), &log));
        let summary = r.render_pages(&mut result, &out).unwrap();
        assert_eq!(summary.pages, 2);

        let drivers = std::fs::read_to_string(&log).unwrap();
        for side in Side::BOTH {
            let target = out.join(format!("p-1.{}.png", side.index()));
            assert_eq!(result.pages["p-1"].input(side), Some(target.as_path()));
            assert!(
                drivers.contains(&format!("/OutputFile ({})", target.display())),
                "no directive for {}",
                target.display()
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn interpreter_stdout_is_captured() {
        let r = rasterizer("echo");
        let mut cmd = Command::new("echo");
        cmd.args(["processing", "p-1.eps"]);
        let (status, lines) = r.run_interpreter(&mut cmd).unwrap();
        assert!(status.success());
        assert_eq!(lines, vec!["processing p-1.eps".to_string()]);
    }
}
