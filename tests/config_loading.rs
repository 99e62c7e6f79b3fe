use assetpipe::config::{load_and_validate, load_from_path, OpConfig};
use assetpipe::errors::AssetpipeError;
use assetpipe::types::ChangeKind;
use assetpipe_test_utils::builders::{ConfigFileBuilder, StepConfigBuilder, WatchConfigBuilder};
use assetpipe_test_utils::write_tree;

const FULL: &str = r#"
[config]
debounce_ms = 150
reload_cmd = "true"

[default]
exclude = ["**/*.tmp"]

[step.clean]
input = "build/**/*"
output = "build"
ops = ["remove"]

[step.styles]
input = "src/scss/main.scss"
output = "build/css"
ops = [{ exec = "sassc --stdin" }, { ext = "css" }, "size"]

[step.scripts]
input = "src/js/**/*.js"
output = "build/js"
ops = [{ concat = "main.js" }]
all_or_nothing = true

[step.sprite]
input = "src/icons/*.svg"
output = "build/icons"
ops = [{ sprite = "sprite-svg.svg" }]
when_exists = "src/icons"

[step.fonts]
input = "src/fonts/**/*.{ttf,woff,woff2,eot,svg}"
output = "build/fonts"
skip_if_newer = true

[[stage]]
steps = ["clean"]

[[stage]]
steps = ["styles", "scripts", "sprite", "fonts"]

[[watch]]
name = "styles"
patterns = ["src/scss/**/*.scss"]
run = ["styles"]
reload = true
events = ["change"]

[[watch]]
patterns = ["src/*.html"]
reload = true
events = ["add", "unlink"]
"#;

fn write_config(contents: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("Assetpipe.toml", contents)]);
    dir
}

#[test]
fn full_config_builds_pipeline_and_watch_profiles() {
    let dir = write_config(FULL);
    let cfg = load_and_validate(dir.path().join("Assetpipe.toml")).unwrap();

    assert_eq!(cfg.config.debounce_ms, 150);
    assert_eq!(
        cfg.step["styles"].ops,
        [
            OpConfig::Exec("sassc --stdin".into()),
            OpConfig::Ext("css".into()),
            OpConfig::Size
        ]
    );

    let pipeline = cfg.build_pipeline().unwrap();
    assert_eq!(pipeline.stages().len(), 2);
    assert_eq!(pipeline.stages()[1].steps().len(), 4);
    assert!(pipeline.step("sprite").unwrap().options().guard.is_some());
    assert!(pipeline.step("scripts").unwrap().options().all_or_nothing);

    let profiles = cfg.watch_profiles().unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].name(), "styles");
    assert!(profiles[0].matches("src/scss/base/_grid.scss", ChangeKind::Change));
    assert!(!profiles[0].matches("src/scss/base/_grid.scss", ChangeKind::Add));
    assert!(!profiles[0].matches("src/scss/x.tmp", ChangeKind::Change));

    assert_eq!(profiles[1].name(), "watch-2");
    assert!(profiles[1].run().is_empty());
    assert!(profiles[1].matches("src/index.html", ChangeKind::Remove));
}

#[test]
fn steps_without_stages_run_one_per_stage_in_name_order() {
    let cfg = ConfigFileBuilder::new()
        .with_step("b-copy", StepConfigBuilder::new("src/*.txt", "out/b").build())
        .with_step("a-clean", StepConfigBuilder::new("out/**/*", "out").op(OpConfig::Remove).build())
        .build();

    let pipeline = cfg.build_pipeline().unwrap();
    let stages: Vec<Vec<String>> = pipeline.stages().iter().map(|s| s.steps().to_vec()).collect();
    assert_eq!(stages, [vec!["a-clean".to_string()], vec!["b-copy".to_string()]]);
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let dir = write_config("[step.css\ninput = ");
    let err = load_from_path(dir.path().join("Assetpipe.toml")).unwrap_err();
    assert!(matches!(err, AssetpipeError::TomlError(_)));
}

#[test]
fn unknown_op_is_rejected() {
    let dir = write_config("[step.js]\ninput = \"src/*.js\"\noutput = \"build\"\nops = [\"minify\"]\n");
    let err = load_and_validate(dir.path().join("Assetpipe.toml")).unwrap_err();
    assert!(matches!(err, AssetpipeError::TomlError(_)));
}

#[test]
fn empty_input_pattern_is_a_config_error() {
    let dir = write_config("[step.js]\ninput = \"\"\noutput = \"build\"\n");
    let err = load_and_validate(dir.path().join("Assetpipe.toml")).unwrap_err();
    assert!(matches!(err, AssetpipeError::ConfigError(ref m) if m.contains("step 'js'")));
}

#[test]
fn watch_defaults_to_every_event_kind() {
    let cfg = ConfigFileBuilder::new()
        .with_step("css", StepConfigBuilder::new("src/*.css", "build").build())
        .with_default_exclude("**/*.map")
        .with_watch(WatchConfigBuilder::new("src/**/*").run("css").build())
        .build();

    let profile = cfg.watch_profiles().unwrap().remove(0);
    for kind in ChangeKind::ALL {
        assert!(profile.matches("src/a.css", kind));
    }
    assert!(!profile.matches("src/a.css.map", ChangeKind::Change));
}
