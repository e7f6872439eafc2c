//! Debounced filesystem watcher over the data root.
//!
//! The external collector performs multi-step writes (write, then rename, then
//! append), so raw OS notifications arrive in bursts. Events are coalesced
//! per path: after the last write to a path the watcher waits out a stability
//! window before emitting a single event, polling on a fixed interval to
//! detect that the path has settled. Consumers therefore never observe a
//! half-written file.
//!
//! Deletions are intentionally never emitted; consumers re-read on `added`/
//! `changed` and treat missing files as absence. This is a carried-over
//! limitation of the event contract, not an oversight to fix silently.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::event::EventKind;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ts_rs::TS;

use crate::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../bindings/")]
pub enum ChangeKind {
    Added,
    Changed,
}

/// Pointer to a mutated path; carries no content, the receiver re-reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../bindings/")]
pub struct ChangeEvent {
    pub path: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy)]
pub struct WatcherOptions {
    /// Quiet period a path must sustain before its event is emitted.
    pub stability_window: Duration,
    /// How often settled paths are checked for while the queue is idle.
    pub poll_interval: Duration,
    /// Events for paths nested deeper than this below the root are dropped.
    pub max_depth: usize,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            stability_window: Duration::from_millis(300),
            poll_interval: Duration::from_millis(100),
            max_depth: 10,
        }
    }
}

struct Pending {
    kind: ChangeKind,
    last_write: Instant,
}

/// Recursive watch over the data root. `stopped -> running` on construction,
/// `running -> stopped` on [`DataWatcher::stop`] (or drop); nothing else.
pub struct DataWatcher {
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl DataWatcher {
    /// Start watching `root` with the production timing profile.
    pub fn start<F>(root: &Path, on_event: F) -> AppResult<Self>
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        Self::with_options(root, WatcherOptions::default(), on_event)
    }

    pub fn with_options<F>(root: &Path, options: WatcherOptions, on_event: F) -> AppResult<Self>
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        let root = root.to_path_buf();
        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();

        let mut watcher = notify::recommended_watcher(move |result| {
            let _ = tx.send(result);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = shutdown.clone();
        let worker = thread::Builder::new()
            .name("daybook-watch".into())
            .spawn(move || debounce_loop(root, options, rx, worker_shutdown, on_event))
            .map_err(crate::AppError::from)?;

        debug!(target: "daybook", event = "watcher_started");
        Ok(Self {
            watcher: Some(watcher),
            worker: Some(worker),
            shutdown,
        })
    }

    /// Release the OS watch handle and join the debounce worker. Skipping
    /// this leaks a watch descriptor for the process lifetime, which is why
    /// `Drop` also calls it.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Dropping the handle tears down the OS watch and closes the event
        // channel, which unblocks the worker.
        self.watcher.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!(target: "daybook", event = "watcher_stopped");
    }
}

impl Drop for DataWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn debounce_loop<F>(
    root: PathBuf,
    options: WatcherOptions,
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
    shutdown: Arc<AtomicBool>,
    on_event: F,
) where
    F: Fn(ChangeEvent),
{
    let mut pending: HashMap<PathBuf, Pending> = HashMap::new();

    loop {
        match rx.recv_timeout(options.poll_interval) {
            Ok(Ok(event)) => queue_event(&root, &options, &event, &mut pending),
            Ok(Err(err)) => {
                // Backend hiccups are logged and absorbed; the watch stays up.
                warn!(target: "daybook", event = "watch_backend_error", error = %err);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        flush_settled(&mut pending, options.stability_window, &on_event);
    }
}

fn queue_event(
    root: &Path,
    options: &WatcherOptions,
    event: &notify::Event,
    pending: &mut HashMap<PathBuf, Pending>,
) {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Modify(_) => ChangeKind::Changed,
        // Deletions and access events are not part of the contract.
        _ => return,
    };

    for path in &event.paths {
        if !accepts_path(root, path, options.max_depth) {
            continue;
        }
        let now = Instant::now();
        pending
            .entry(path.clone())
            .and_modify(|entry| {
                entry.last_write = now;
                // A creation followed by writes within the window is one
                // `added` event, never `added` + `changed`.
                if kind == ChangeKind::Added {
                    entry.kind = ChangeKind::Added;
                }
            })
            .or_insert(Pending {
                kind,
                last_write: now,
            });
    }
}

fn flush_settled<F>(pending: &mut HashMap<PathBuf, Pending>, window: Duration, on_event: &F)
where
    F: Fn(ChangeEvent),
{
    let settled: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, entry)| entry.last_write.elapsed() >= window)
        .map(|(path, _)| path.clone())
        .collect();

    for path in settled {
        if let Some(entry) = pending.remove(&path) {
            on_event(ChangeEvent {
                path: path.to_string_lossy().into_owned(),
                kind: entry.kind,
            });
        }
    }
}

/// Accept paths under `root` that contain no dot-prefixed component and sit
/// at most `max_depth` levels below the root.
fn accepts_path(root: &Path, path: &Path, max_depth: usize) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                depth += 1;
                if name.to_string_lossy().starts_with('.') {
                    return false;
                }
            }
            _ => return false,
        }
    }
    depth > 0 && depth <= max_depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_paths_inside_root() {
        let root = Path::new("/data");
        assert!(accepts_path(root, Path::new("/data/2026-02-09/raw.json"), 10));
        assert!(accepts_path(root, Path::new("/data/user.json"), 10));
    }

    #[test]
    fn rejects_dot_prefixed_components() {
        let root = Path::new("/data");
        assert!(!accepts_path(root, Path::new("/data/.tmp"), 10));
        assert!(!accepts_path(root, Path::new("/data/notes/.cache/x"), 10));
    }

    #[test]
    fn rejects_paths_outside_root_and_root_itself() {
        let root = Path::new("/data");
        assert!(!accepts_path(root, Path::new("/elsewhere/file"), 10));
        assert!(!accepts_path(root, Path::new("/data"), 10));
    }

    #[test]
    fn enforces_depth_cap() {
        let root = Path::new("/data");
        let mut shallow = PathBuf::from("/data");
        for i in 0..10 {
            shallow.push(format!("d{i}"));
        }
        assert!(accepts_path(root, &shallow, 10));
        shallow.push("one-too-deep");
        assert!(!accepts_path(root, &shallow, 10));
    }
}
