//! Recursive discovery of date-named snapshot folders.
//!
//! A snapshot folder is a directory literally named `YYYY-MM-DD`. Because the
//! format is fixed-width and zero-padded, lexicographic comparison of the
//! names is exactly date order, so "latest" never needs a date parse. Any
//! directory that does not match the pattern is an ordinary container (e.g. a
//! nested notes folder) and is recursed into.
//!
//! Neither walk guards against symlink cycles or unbounded depth; that
//! mirrors the collector contract (the tree is shallow and symlink-free). A
//! hostile or misconfigured tree with a directory cycle would make these
//! walks spin. See DESIGN.md.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use ts_rs::TS;

/// Snapshot file the external collector writes inside each dated folder.
pub const TELEMETRY_FILE: &str = "raw_telemetry.json";

/// Narrative summary written next to the snapshot.
pub const SUMMARY_FILE: &str = "daily_summary.md";

static DATED_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("dated folder pattern"));

/// One day's aggregated metrics, in directory-discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
pub struct CalendarEntry {
    pub date: String,
    pub flow: f64,
    pub keystrokes: u64,
}

/// Find the most recent dated folder anywhere under `root`.
///
/// Returns `None` when the tree holds no dated folder at all; callers treat
/// that as "no data yet", not as an error. I/O failures on a subdirectory
/// (permissions, races with the collector) silently skip that subtree; a
/// partial scan result beats an aborted one.
pub fn find_latest(root: &Path) -> Option<PathBuf> {
    let mut best: Option<(String, PathBuf)> = None;
    visit_latest(root, &mut best);
    best.map(|(_, path)| path)
}

fn visit_latest(dir: &Path, best: &mut Option<(String, PathBuf)>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if DATED_DIR.is_match(&name) {
            // Strictly greater-than: the first folder seen for a given date
            // string stays selected if duplicates exist at different depths.
            let replace = match best {
                Some((current, _)) => name.as_ref() > current.as_str(),
                None => true,
            };
            if replace {
                *best = Some((name.into_owned(), entry.path()));
            }
        } else {
            visit_latest(&entry.path(), best);
        }
    }
}

/// Collect a calendar entry for every dated folder under `root` whose
/// snapshot file exists and parses.
///
/// A folder with an unreadable or malformed snapshot yields no entry at all;
/// a parsable snapshot with a missing or mistyped metric field yields an
/// entry with that field defaulted to 0. The result carries no ordering
/// guarantee; callers wanting chronology sort by the date string.
pub fn scan_calendar(root: &Path) -> Vec<CalendarEntry> {
    let mut entries = Vec::new();
    visit_calendar(root, &mut entries);
    entries
}

fn visit_calendar(dir: &Path, out: &mut Vec<CalendarEntry>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if DATED_DIR.is_match(&name) {
            if let Some(metrics) = read_snapshot_metrics(&entry.path()) {
                out.push(CalendarEntry {
                    date: name.into_owned(),
                    flow: metrics.0,
                    keystrokes: metrics.1,
                });
            }
        } else {
            visit_calendar(&entry.path(), out);
        }
    }
}

fn read_snapshot_metrics(folder: &Path) -> Option<(f64, u64)> {
    let snapshot_path = folder.join(TELEMETRY_FILE);
    let raw = fs::read(&snapshot_path).ok()?;
    let doc: Value = match serde_json::from_slice(&raw) {
        Ok(doc) => doc,
        Err(err) => {
            debug!(
                target: "daybook",
                event = "snapshot_parse_failed",
                path = %snapshot_path.display(),
                error = %err
            );
            return None;
        }
    };
    let metrics = doc.get("metrics");
    let flow = metrics
        .and_then(|m| m.get("flow_score_estimate"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let keystrokes = metrics
        .and_then(|m| m.get("total_keystrokes"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Some((flow, keystrokes))
}
