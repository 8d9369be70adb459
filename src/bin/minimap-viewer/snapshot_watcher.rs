//! Reloads the map snapshot whenever its file changes on disk.
//!
//! The parent directory is watched rather than the file itself, so editors and exporters
//! that replace the file atomically are still picked up.

use eframe::egui;
use minimap::snapshot::{MapSnapshot, SnapshotError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};

/// Watches one snapshot file and parses it off the UI thread.
pub struct SnapshotWatcher {
    path: PathBuf,
    /// Receiver for parsed snapshots from the file watcher
    snapshot_rx: Receiver<Result<MapSnapshot, SnapshotError>>,
    /// The watcher must be kept alive for events to fire
    _watcher: RecommendedWatcher,
}

impl SnapshotWatcher {
    /// Starts watching `path`.
    ///
    /// Returns `None` if the containing folder doesn't exist or watching fails.
    pub fn new(path: &Path, ctx: egui::Context) -> Option<Self> {
        let path = path.canonicalize().ok()?;
        let folder = path.parent()?.to_owned();
        let (snapshot_tx, snapshot_rx) = mpsc::channel();

        let target = path.clone();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    log::warn!("Snapshot watcher error: {err}");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            if !event.paths.iter().any(|p| p.file_name() == target.file_name()) {
                return;
            }
            let result = MapSnapshot::load(&target);
            if result.is_ok() {
                log::info!("Snapshot changed: {}", target.display());
            }
            let _ = snapshot_tx.send(result);
            ctx.request_repaint();
        })
        .ok()?;

        watcher.watch(&folder, RecursiveMode::NonRecursive).ok()?;
        log::info!("Watching snapshot file: {}", path.display());

        Some(Self {
            path,
            snapshot_rx,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drains pending reloads and returns the most recent one, if any.
    pub fn poll(&mut self) -> Option<Result<MapSnapshot, SnapshotError>> {
        let mut latest = None;
        loop {
            match self.snapshot_rx.try_recv() {
                Ok(result) => latest = Some(result),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Snapshot watcher channel disconnected");
                    break;
                }
            }
        }
        latest
    }
}
