// src/engine/orchestrator.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use super::binding::{spawn_binding, BindingHandle};
use super::{ChangeAction, WatchChange};
use crate::errors::{AssetpipeError, Result};
use crate::watch::{spawn_observer, WatchProfile, WatcherHandle};

/// Owns every watch binding of a `watch` session: one observer plus one
/// debounced binding task per binding.
#[derive(Debug)]
pub struct Orchestrator {
    root: PathBuf,
    debounce: Duration,
    shutdown: watch::Sender<bool>,
    bindings: Vec<BindingHandle>,
    observers: Vec<WatcherHandle>,
}

impl Orchestrator {
    pub fn new(root: impl Into<PathBuf>, debounce: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            root: root.into(),
            debounce,
            shutdown,
            bindings: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn binding_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name())
    }

    /// Start a debounced binding fed by a filesystem observer for `profile`.
    ///
    /// If the observer cannot start, the binding is torn down again and a
    /// [`AssetpipeError::WatchObserver`] is returned; other bindings are
    /// unaffected.
    pub fn watch(&mut self, profile: WatchProfile, action: Arc<dyn ChangeAction>) -> Result<()> {
        let name = profile.name().to_string();
        let tx = self.bind(name.clone(), action);

        match spawn_observer(self.root.clone(), profile, tx) {
            Ok(observer) => {
                self.observers.push(observer);
                Ok(())
            }
            Err(source) => {
                // Only the handle holds a sender; dropping it ends the task.
                if let Some(pos) = self.bindings.iter().position(|b| b.name() == name) {
                    drop(self.bindings.remove(pos));
                }
                Err(AssetpipeError::WatchObserver {
                    binding: name,
                    source,
                })
            }
        }
    }

    /// Start one observed binding per profile, building each action with
    /// `action_for`. A binding whose observer fails is logged and left out;
    /// the others keep running. Returns how many bindings started.
    pub fn watch_all<F>(&mut self, profiles: Vec<WatchProfile>, mut action_for: F) -> usize
    where
        F: FnMut(&WatchProfile) -> Arc<dyn ChangeAction>,
    {
        let mut started = 0;
        for profile in profiles {
            let name = profile.name().to_string();
            debug!(
                binding = %name,
                patterns = ?profile.patterns(),
                events = ?profile.events(),
                "starting watch binding"
            );
            let action = action_for(&profile);
            match self.watch(profile, action) {
                Ok(()) => started += 1,
                Err(err) => error!(binding = %name, error = %err, "watch binding not started"),
            }
        }
        started
    }

    /// Start a debounced binding without an observer; changes are fed
    /// through the returned sender.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        action: Arc<dyn ChangeAction>,
    ) -> mpsc::Sender<WatchChange> {
        let handle = spawn_binding(name, self.debounce, action, self.shutdown.subscribe());
        debug!(binding = %handle.name(), window_ms = self.debounce.as_millis(), "binding started");
        let tx = handle.sender();
        self.bindings.push(handle);
        tx
    }

    /// Stop all observers and bindings. Pending debounces and queued re-runs
    /// are dropped; a run already in progress finishes first.
    pub async fn stop(self) {
        info!(bindings = self.bindings.len(), "stopping watch orchestrator");
        let _ = self.shutdown.send(true);
        drop(self.observers);

        for binding in self.bindings {
            let name = binding.name().to_string();
            let runs = binding.join().await;
            debug!(binding = %name, runs, "binding stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::sleep;

    use super::*;
    use crate::types::ChangeKind;
    use crate::watch::{build_watch_profiles, RawWatchSpec, WatchDefaults};

    #[derive(Debug, Default)]
    struct Counter(AtomicUsize);

    impl ChangeAction for Counter {
        fn on_change(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    fn change(path: &str) -> WatchChange {
        WatchChange {
            path: PathBuf::from(path),
            kind: ChangeKind::Change,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bindings_debounce_independently() {
        let mut orch = Orchestrator::new("/p", Duration::from_millis(100));
        let css = Arc::new(Counter::default());
        let js = Arc::new(Counter::default());
        let css_tx = orch.bind("css", css.clone());
        let js_tx = orch.bind("js", js.clone());

        for _ in 0..3 {
            css_tx.send(change("src/a.scss")).await.unwrap();
            sleep(Duration::from_millis(30)).await;
        }
        js_tx.send(change("src/a.js")).await.unwrap();
        sleep(Duration::from_millis(300)).await;

        assert_eq!(css.0.load(Ordering::SeqCst), 1);
        assert_eq!(js.0.load(Ordering::SeqCst), 1);
        orch.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drops_pending_debounce() {
        let mut orch = Orchestrator::new("/p", Duration::from_millis(100));
        let counter = Arc::new(Counter::default());
        let tx = orch.bind("css", counter.clone());

        tx.send(change("src/a.scss")).await.unwrap();
        sleep(Duration::from_millis(10)).await;
        drop(tx);
        orch.stop().await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn observer_on_real_directory_starts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let profile = build_watch_profiles(
            &WatchDefaults::default(),
            &[RawWatchSpec::new("src", vec!["src/**/*".into()], vec![])],
        )
        .unwrap()
        .remove(0);

        let mut orch = Orchestrator::new(dir.path(), Duration::from_millis(50));
        orch.watch(profile, Arc::new(Counter::default())).unwrap();
        assert_eq!(orch.binding_names().collect::<Vec<_>>(), ["src"]);
        orch.stop().await;
    }

    #[tokio::test]
    async fn file_as_watch_root_is_an_observer_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.js"), "app()").unwrap();
        let profile = build_watch_profiles(
            &WatchDefaults::default(),
            &[RawWatchSpec::new("maps", vec!["src/app.js/*.map".into()], vec![])],
        )
        .unwrap()
        .remove(0);

        let mut orch = Orchestrator::new(dir.path(), Duration::from_millis(50));
        let err = orch.watch(profile, Arc::new(Counter::default())).unwrap_err();

        assert!(matches!(err, AssetpipeError::WatchObserver { ref binding, .. } if binding == "maps"));
        assert_eq!(orch.binding_names().count(), 0);
        orch.stop().await;
    }
}
