// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::engine::WatchChange;
use crate::pipeline::runner::relative_slash;
use crate::types::ChangeKind;
use crate::watch::patterns::WatchProfile;

/// Handle for one binding's filesystem observer.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle
/// stops watching and ends the forwarding task.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    forward: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.forward.abort();
    }
}

/// Start observing the directories `profile` cares about and forward
/// matching changes (root-relative) into `changes`.
///
/// - `root` is the project root against which all glob patterns are evaluated.
/// - Watch roots that do not exist yet are skipped with a warning; if none
///   exist, the project root itself is watched so later additions are seen.
/// - A watch root that exists but is not a directory is an error.
pub fn spawn_observer(
    root: impl Into<PathBuf>,
    profile: WatchProfile,
    changes: mpsc::Sender<WatchChange>,
) -> notify::Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let binding = profile.name().to_string();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // The receiver is gone once the handle is dropped.
                let _ = event_tx.send(event);
            }
            Err(err) => {
                eprintln!("assetpipe: file watch error ({binding}): {err}");
            }
        },
        Config::default(),
    )?;

    let mut watched = 0;
    for rel in profile.watch_roots() {
        let dir = root.join(&rel);
        if dir.exists() && !dir.is_dir() {
            return Err(notify::Error::generic("watch root is not a directory").add_path(dir));
        }
        if !dir.is_dir() {
            warn!(binding = %profile.name(), dir = %dir.display(), "watch directory does not exist; skipping");
            continue;
        }
        watcher.watch(&dir, RecursiveMode::Recursive)?;
        watched += 1;
    }
    if watched == 0 {
        watcher.watch(&root, RecursiveMode::Recursive)?;
    }

    info!(binding = %profile.name(), root = %root.display(), "file observer started");

    let forward = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            trace!(binding = %profile.name(), ?event, "received notify event");

            let Some(kind) = ChangeKind::from_notify(&event.kind) else {
                continue;
            };

            for path in &event.paths {
                let Some(rel) = relative_slash(&root, path) else {
                    warn!(
                        "could not relativize path {:?} against root {:?}",
                        path, root
                    );
                    continue;
                };
                if !profile.matches(&rel, kind) {
                    continue;
                }

                debug!(binding = %profile.name(), path = %rel, ?kind, "watch match");
                let change = WatchChange {
                    path: Path::new(&rel).to_path_buf(),
                    kind,
                };
                match changes.try_send(change) {
                    Ok(()) => {}
                    // A full queue already holds a pending trigger.
                    Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!(binding = %profile.name(), "binding closed; observer exiting");
                        return;
                    }
                }
            }
        }
    });

    Ok(WatcherHandle {
        _inner: watcher,
        forward,
    })
}
