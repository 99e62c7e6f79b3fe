use std::sync::Arc;
use std::time::Duration;

use assetpipe::exec::Collaborator;
use assetpipe::fs::MockFileSystem;
use assetpipe::pipeline::{Pipeline, Runner, StepOptions};
use assetpipe_test_utils::fake_collaborator::{AlwaysFail, Instrumented, Timeline};
use assetpipe_test_utils::init_tracing;

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/p/src/main.css", "body{}");
    fs.add_file("/p/src/app.js", "main()");
    fs.add_file("/p/src/icon.svg", "<svg></svg>");
    fs
}

fn runner(
    fs: &MockFileSystem,
    steps: Vec<(&str, &str, &str, Vec<Arc<dyn Collaborator>>)>,
    stages: &[&[&str]],
) -> Runner {
    let mut builder = Pipeline::builder();
    for (name, input, output, ops) in steps {
        builder
            .register_step(name, input, output, ops, StepOptions::default())
            .unwrap();
    }
    for stage in stages.iter().copied() {
        builder.register_stage(stage).unwrap();
    }
    Runner::new(Arc::new(builder.build()), Arc::new(fs.clone()), "/p")
}

#[tokio::test(start_paused = true)]
async fn next_stage_starts_after_every_member_of_the_previous_one_ends() {
    init_tracing();
    let fs = project();
    let timeline = Timeline::new();
    let runner = runner(
        &fs,
        vec![
            ("css", "src/*.css", "build/css", vec![Instrumented::new("css", Duration::from_millis(50), &timeline)]),
            ("js", "src/*.js", "build/js", vec![Instrumented::new("js", Duration::from_millis(120), &timeline)]),
            ("sprite", "src/*.svg", "build/icons", vec![Instrumented::new("sprite", Duration::from_millis(10), &timeline)]),
        ],
        &[&["css", "js"], &["sprite"]],
    );

    let report = runner.run_all().await;
    assert!(report.is_success());
    assert!(report.not_run.is_empty());

    let (css_start, css_end) = timeline.span("css").unwrap();
    let (js_start, js_end) = timeline.span("js").unwrap();
    let (sprite_start, _) = timeline.span("sprite").unwrap();

    // Members of one stage overlap.
    assert!(js_start < css_end);
    assert!(css_start < js_end);
    // The next stage waits for both.
    assert!(sprite_start >= css_end.max(js_end));

    assert_eq!(fs.contents("/p/build/icons/icon.svg").unwrap(), b"<svg></svg>");
}

#[tokio::test(start_paused = true)]
async fn failed_stage_keeps_later_stages_from_starting() {
    init_tracing();
    let fs = project();
    let timeline = Timeline::new();
    let runner = runner(
        &fs,
        vec![
            ("css", "src/*.css", "build/css", vec![AlwaysFail::new()]),
            ("js", "src/*.js", "build/js", vec![Instrumented::new("js", Duration::from_millis(30), &timeline)]),
            ("sprite", "src/*.svg", "build/icons", vec![Instrumented::new("sprite", Duration::ZERO, &timeline)]),
        ],
        &[&["css", "js"], &["sprite"]],
    );

    let report = runner.run_all().await;

    assert!(!report.is_success());
    assert_eq!(report.failed_steps(), ["css"]);
    assert_eq!(report.not_run, ["sprite"]);
    // The sibling already running finished normally.
    assert!(report.report("js").unwrap().is_success());
    assert!(timeline.span("js").is_some());
    assert!(timeline.span("sprite").is_none());
    assert!(fs.contents("/p/build/css/main.css").is_none());
}

#[tokio::test(start_paused = true)]
async fn run_sequence_ignores_stage_membership() {
    let fs = project();
    let timeline = Timeline::new();
    let runner = runner(
        &fs,
        vec![
            ("css", "src/*.css", "build/css", vec![Instrumented::new("css", Duration::from_millis(5), &timeline)]),
            ("js", "src/*.js", "build/js", vec![Instrumented::new("js", Duration::from_millis(5), &timeline)]),
            ("sprite", "src/*.svg", "build/icons", vec![Instrumented::new("sprite", Duration::from_millis(5), &timeline)]),
        ],
        &[&["css", "js"], &["sprite"]],
    );

    let report = runner.run_sequence(&["sprite", "js", "css"]).await.unwrap();

    assert!(report.is_success());
    assert_eq!(timeline.start_order(), ["sprite", "js", "css"]);
    let (_, sprite_end) = timeline.span("sprite").unwrap();
    let (js_start, js_end) = timeline.span("js").unwrap();
    let (css_start, _) = timeline.span("css").unwrap();
    assert!(js_start >= sprite_end);
    assert!(css_start >= js_end);
}
