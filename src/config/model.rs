// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Result;
use crate::exec::{
    ChangeExtension, Collaborator, Concat, RemoveSource, Rename, ReportSize, ShellCommand,
    SvgSprite,
};
use crate::pipeline::{Guard, Pipeline, StepOptions};
use crate::types::ChangeKind;
use crate::watch::{build_watch_profiles, RawWatchSpec, WatchDefaults, WatchProfile};

/// Top-level configuration as read from `Assetpipe.toml`.
///
/// ```toml
/// [config]
/// debounce_ms = 100
///
/// [default]
/// exclude = ["**/*.tmp"]
///
/// [step.styles]
/// input = "src/scss/main.scss"
/// output = "build/css"
/// ops = [{ exec = "sass --stdin" }, { ext = "css" }]
///
/// [[stage]]
/// steps = ["styles"]
///
/// [[watch]]
/// patterns = ["src/scss/**/*.scss"]
/// run = ["styles"]
/// reload = true
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// All steps from `[step.<name>]`.
    #[serde(default)]
    pub step: BTreeMap<String, StepConfig>,

    /// Build stages, in order. When absent every step is its own stage, in
    /// name order.
    #[serde(default)]
    pub stage: Vec<StageConfig>,

    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Quiet period after the last change before a binding fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Shell command run after every reload broadcast, e.g. to poke an
    /// external live-reload server.
    #[serde(default)]
    pub reload_cmd: Option<String>,
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            reload_cmd: None,
        }
    }
}

impl ConfigSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultSection {
    /// Exclude patterns applied to watch bindings that do not override them.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[step.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Glob relative to the project root.
    pub input: String,

    /// Output directory relative to the project root.
    pub output: PathBuf,

    /// Operations applied in order. Empty means a plain copy.
    #[serde(default)]
    pub ops: Vec<OpConfig>,

    #[serde(default)]
    pub skip_if_newer: bool,

    /// Skip the step unless this path (relative to the root) exists.
    #[serde(default)]
    pub when_exists: Option<PathBuf>,

    #[serde(default)]
    pub all_or_nothing: bool,
}

impl StepConfig {
    pub fn options(&self) -> StepOptions {
        StepOptions {
            skip_if_newer: self.skip_if_newer,
            guard: self.when_exists.clone().map(Guard::PathExists),
            all_or_nothing: self.all_or_nothing,
        }
    }
}

/// One entry of `ops = [...]`: either a bare string (`"size"`) or a
/// single-key inline table (`{ exec = "sass --stdin" }`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpConfig {
    Exec(String),
    Rename(String),
    Ext(String),
    Concat(String),
    Sprite(String),
    Size,
    Remove,
}

impl OpConfig {
    pub fn to_collaborator(&self) -> Arc<dyn Collaborator> {
        match self {
            OpConfig::Exec(cmd) => Arc::new(ShellCommand::new(cmd.clone())),
            OpConfig::Rename(name) => Arc::new(Rename::new(name.clone())),
            OpConfig::Ext(ext) => Arc::new(ChangeExtension::new(ext.clone())),
            OpConfig::Concat(name) => Arc::new(Concat::new(name.clone())),
            OpConfig::Sprite(name) => Arc::new(SvgSprite::new(name.clone())),
            OpConfig::Size => Arc::new(ReportSize),
            OpConfig::Remove => Arc::new(RemoveSource),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            OpConfig::Exec(cmd) => format!("exec `{cmd}`"),
            OpConfig::Rename(name) => format!("rename -> {name}"),
            OpConfig::Ext(ext) => format!("ext -> .{}", ext.trim_start_matches('.')),
            OpConfig::Concat(name) => format!("concat -> {name}"),
            OpConfig::Sprite(name) => format!("sprite -> {name}"),
            OpConfig::Size => "size".to_string(),
            OpConfig::Remove => "remove".to_string(),
        }
    }
}

/// `[[stage]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub steps: Vec<String>,
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Used in logs; defaults to `watch-<index>`.
    #[serde(default)]
    pub name: Option<String>,

    pub patterns: Vec<String>,

    /// If `None`, the binding uses `default.exclude`.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    /// If true, `default.exclude` is appended to `exclude`; otherwise
    /// `exclude` replaces it.
    #[serde(default)]
    pub append_default_exclude: bool,

    #[serde(default = "all_change_kinds")]
    pub events: Vec<ChangeKind>,

    /// Steps to re-run, in order. May be empty.
    #[serde(default)]
    pub run: Vec<String>,

    #[serde(default)]
    pub reload: bool,
}

fn all_change_kinds() -> Vec<ChangeKind> {
    ChangeKind::ALL.to_vec()
}

impl WatchConfig {
    pub fn display_name(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("watch-{}", index + 1))
    }
}

impl ConfigFile {
    /// Stage layout to register: the configured stages, or one stage per
    /// step (in name order) when none are configured.
    pub fn effective_stages(&self) -> Vec<Vec<String>> {
        if self.stage.is_empty() {
            self.step.keys().map(|name| vec![name.clone()]).collect()
        } else {
            self.stage.iter().map(|s| s.steps.clone()).collect()
        }
    }

    /// Register every step and stage into an immutable [`Pipeline`].
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let mut builder = Pipeline::builder();
        for (name, step) in &self.step {
            let ops = step.ops.iter().map(OpConfig::to_collaborator).collect();
            builder.register_step(name, &step.input, &step.output, ops, step.options())?;
        }
        for stage in self.effective_stages() {
            builder.register_stage(&stage)?;
        }
        Ok(builder.build())
    }

    pub fn watch_specs(&self) -> Vec<RawWatchSpec> {
        self.watch
            .iter()
            .enumerate()
            .map(|(i, w)| RawWatchSpec {
                name: w.display_name(i),
                patterns: w.patterns.clone(),
                exclude: w.exclude.clone(),
                append_default_exclude: w.append_default_exclude,
                events: w.events.clone(),
                run: w.run.clone(),
                reload: w.reload,
            })
            .collect()
    }

    /// Compile every `[[watch]]` binding.
    pub fn watch_profiles(&self) -> Result<Vec<WatchProfile>> {
        let defaults = WatchDefaults {
            exclude: self.default.exclude.clone(),
        };
        Ok(build_watch_profiles(&defaults, &self.watch_specs())?)
    }
}
