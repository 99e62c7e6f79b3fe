use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assetpipe::engine::{ChangeAction, Orchestrator};
use assetpipe::watch::{build_watch_profiles, RawWatchSpec, WatchDefaults, WatchProfile};
use assetpipe_test_utils::{init_tracing, with_timeout, write_tree};
use tokio::time::sleep;

const WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Counter(AtomicUsize);

impl Counter {
    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    async fn wait_for(&self, n: usize) {
        while self.get() < n {
            sleep(Duration::from_millis(20)).await;
        }
    }
}

impl ChangeAction for Counter {
    fn on_change(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.0.fetch_add(1, Ordering::SeqCst);
        })
    }
}

fn profiles(specs: &[RawWatchSpec]) -> Vec<WatchProfile> {
    let defaults = WatchDefaults {
        exclude: vec!["**/_*.scss".into()],
    };
    build_watch_profiles(&defaults, specs).unwrap()
}

#[tokio::test]
async fn real_file_write_triggers_one_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("src/scss/.keep", "")]);

    let counter = Arc::new(Counter::default());
    let mut orchestrator = Orchestrator::new(dir.path(), WINDOW);
    let started = orchestrator.watch_all(
        profiles(&[RawWatchSpec::new("styles", vec!["src/scss/**/*.scss".into()], vec![])]),
        |_| counter.clone() as Arc<dyn ChangeAction>,
    );
    assert_eq!(started, 1);

    // Neither a partial nor a non-matching file triggers the binding.
    write_tree(dir.path(), &[("src/scss/_vars.scss", "$a: 1;"), ("src/scss/notes.txt", "x")]);
    sleep(WINDOW * 3).await;
    assert_eq!(counter.get(), 0);

    write_tree(dir.path(), &[("src/scss/a.scss", "a { color: red; }")]);
    with_timeout(counter.wait_for(1)).await;
    sleep(WINDOW * 3).await;
    assert_eq!(counter.get(), 1);

    orchestrator.stop().await;
}

#[tokio::test]
async fn failed_binding_leaves_the_others_running() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("src/app.js", "app()"), ("src/scss/.keep", "")]);

    let counter = Arc::new(Counter::default());
    let mut orchestrator = Orchestrator::new(dir.path(), WINDOW);
    let started = orchestrator.watch_all(
        profiles(&[
            // Its watch root `src/app.js` is a regular file.
            RawWatchSpec::new("maps", vec!["src/app.js/*.map".into()], vec![]),
            RawWatchSpec::new("styles", vec!["src/scss/**/*.scss".into()], vec![]),
        ]),
        |_| counter.clone() as Arc<dyn ChangeAction>,
    );

    assert_eq!(started, 1);
    assert_eq!(orchestrator.binding_names().collect::<Vec<_>>(), ["styles"]);

    write_tree(dir.path(), &[("src/scss/a.scss", "a {}")]);
    with_timeout(counter.wait_for(1)).await;

    orchestrator.stop().await;
}
