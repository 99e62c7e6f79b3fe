#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use assetpipe::config::{
    ConfigFile, ConfigSection, DefaultSection, OpConfig, StageConfig, StepConfig, WatchConfig,
};
use assetpipe::types::ChangeKind;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: ConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: ConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                step: BTreeMap::new(),
                stage: Vec::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_step(mut self, name: &str, step: StepConfig) -> Self {
        self.config.step.insert(name.to_string(), step);
        self
    }

    pub fn with_stage(mut self, steps: &[&str]) -> Self {
        self.config.stage.push(StageConfig {
            steps: steps.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_watch(mut self, watch: WatchConfig) -> Self {
        self.config.watch.push(watch);
        self
    }

    pub fn with_default_exclude(mut self, pattern: &str) -> Self {
        self.config.default.exclude.push(pattern.to_string());
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn build(self) -> ConfigFile {
        assetpipe::config::validate_config(&self.config)
            .expect("Failed to build valid config from builder");
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(input: &str, output: &str) -> Self {
        Self {
            step: StepConfig {
                input: input.to_string(),
                output: PathBuf::from(output),
                ops: vec![],
                skip_if_newer: false,
                when_exists: None,
                all_or_nothing: false,
            },
        }
    }

    pub fn op(mut self, op: OpConfig) -> Self {
        self.step.ops.push(op);
        self
    }

    pub fn skip_if_newer(mut self) -> Self {
        self.step.skip_if_newer = true;
        self
    }

    pub fn when_exists(mut self, path: &str) -> Self {
        self.step.when_exists = Some(PathBuf::from(path));
        self
    }

    pub fn all_or_nothing(mut self) -> Self {
        self.step.all_or_nothing = true;
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

/// Builder for a `[[watch]]` binding.
pub struct WatchConfigBuilder {
    watch: WatchConfig,
}

impl WatchConfigBuilder {
    pub fn new(pattern: &str) -> Self {
        Self {
            watch: WatchConfig {
                name: None,
                patterns: vec![pattern.to_string()],
                exclude: None,
                append_default_exclude: false,
                events: ChangeKind::ALL.to_vec(),
                run: vec![],
                reload: false,
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.watch.name = Some(name.to_string());
        self
    }

    pub fn run(mut self, step: &str) -> Self {
        self.watch.run.push(step.to_string());
        self
    }

    pub fn reload(mut self) -> Self {
        self.watch.reload = true;
        self
    }

    pub fn events(mut self, events: &[ChangeKind]) -> Self {
        self.watch.events = events.to_vec();
        self
    }

    pub fn build(self) -> WatchConfig {
        self.watch
    }
}
