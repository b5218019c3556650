// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ranking and report output: the plain listing on stdout and the `index.html`
// gallery in the output directory.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use proofdiff_core::error::{ProofdiffError, Result};
use proofdiff_core::types::{CompareResult, Side};
use tracing::{debug, info, instrument};

/// Name of the gallery file written into the output directory.
pub const INDEX_FILE: &str = "index.html";

/// Order compared pages by distance, most different first, and keep the
/// leading run of nonzero distances, at most `max` of them when `max > 0`.
#[instrument(skip(result))]
pub fn rank(result: &mut CompareResult, max: usize) {
    let mut scored: Vec<(&str, f64)> = result
        .pages
        .values()
        .filter_map(|t| t.distance.map(|d| (t.name.as_str(), d)))
        .collect();
    scored.sort_by(|(an, ad), (bn, bd)| {
        bd.partial_cmp(ad)
            .unwrap_or(Ordering::Equal)
            .then_with(|| an.cmp(bn))
    });

    let mut ranked: Vec<String> = scored
        .into_iter()
        .take_while(|&(_, d)| d != 0.0)
        .map(|(name, _)| name.to_owned())
        .collect();
    if max > 0 {
        ranked.truncate(max);
    }
    info!(ranked = ranked.len(), "Ranked differing pages");
    result.ranked = ranked;
}

/// Hard-link the inputs of every ranked page into `out_dir` as
/// `<name>.0.png` and `<name>.1.png`, next to `<name>.diff.png`.
///
/// Inputs that were rendered into `out_dir` already sit at their final name
/// and are skipped.
pub fn link_files(result: &CompareResult, out_dir: &Path) -> Result<()> {
    for task in result.ranked_pages() {
        for side in Side::BOTH {
            let Some(src) = task.input(side) else {
                continue;
            };
            let dst = out_dir.join(format!("{}.{}.png", task.name, side.index()));
            if same_file(src, &dst) {
                continue;
            }
            std::fs::hard_link(src, &dst).map_err(|e| ProofdiffError::file_op("link", src, e))?;
            debug!(src = %src.display(), dst = %dst.display(), "Linked page image");
        }
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    let canon = |p: &Path| -> Option<PathBuf> { std::fs::canonicalize(p).ok() };
    matches!((canon(a), canon(b)), (Some(x), Some(y)) if x == y)
}

/// One `name - distance` line per ranked page.
pub fn write_listing(result: &CompareResult, w: &mut impl Write) -> Result<()> {
    for task in result.ranked_pages() {
        writeln!(w, "{:<50} - {:.6}", task.name, task.distance.unwrap_or_default())?;
    }
    Ok(())
}

const HTML_HEAD: &str = r#"<html>
  <style>
    table, th, td {
      border: 1px solid grey;
    }
  </style>
  <title>Image comparison</title>
  <body>
    <table>
      <tr><th>dist</th><th>old</th><th>new</th></tr>
"#;

const HTML_TAIL: &str = r#"    </table>
  </body>
</html>
"#;

/// Render the gallery page. The old column shows the old page; the new
/// column stacks the new page under its diff, with a transparent copy of the
/// diff below them to reserve the cell's size.
pub fn write_html(result: &CompareResult, w: &mut impl Write) -> Result<()> {
    w.write_all(HTML_HEAD.as_bytes())?;
    for task in result.ranked_pages() {
        let name = html_escape(&task.name);
        write!(
            w,
            r#"<tr>
  <td>
    {dist:.4}
  </td>
  <td>
    <div>
      <div style="position: absolute">
        <img src="{name}.0.png">
      </div>
      <div style="opacity: 0.0">
        <img src="{name}.0.png">
      </div>
    </div>
    <br>
    {name}
  </td>
  <td>
    <div>
      <div style="position: absolute">
        <img src="{name}.1.png">
      </div>
      <div style="position: absolute; opacity: 1.0">
        <img src="{name}.diff.png">
      </div>
      <div style="opacity: 0.0">
        <img src="{name}.diff.png">
      </div>
    </div>
    <br>
    {name}
  </td>
</tr>
"#,
            dist = task.distance.unwrap_or_default(),
        )?;
    }
    w.write_all(HTML_TAIL.as_bytes())?;
    Ok(())
}

/// Write the gallery to `<out_dir>/index.html` and return its path.
pub fn write_html_file(result: &CompareResult, out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join(INDEX_FILE);
    let file = File::create(&path).map_err(|e| ProofdiffError::file_op("create", &path, e))?;
    let mut w = BufWriter::new(file);
    write_html(result, &mut w)?;
    w.flush().map_err(|e| ProofdiffError::file_op("write", &path, e))?;
    info!(path = %path.display(), pages = result.ranked.len(), "Wrote gallery");
    Ok(path)
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// -- Tests --------------------------------------------------------------------
