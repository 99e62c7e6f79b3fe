// src/pipeline/registry.rs

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::step::{Step, StepName, StepOptions};
use crate::errors::{AssetpipeError, Result};
use crate::exec::Collaborator;

/// Steps that run concurrently; the next stage starts once all finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    steps: Vec<StepName>,
}

impl Stage {
    pub fn steps(&self) -> &[StepName] {
        &self.steps
    }
}

/// Collects step and stage registrations; `build` freezes them into a
/// [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    steps: HashMap<StepName, Arc<Step>>,
    order: Vec<StepName>,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_step(
        &mut self,
        name: &str,
        input: &str,
        output_dir: impl AsRef<Path>,
        ops: Vec<Arc<dyn Collaborator>>,
        options: StepOptions,
    ) -> Result<&mut Self> {
        let step = Step::new(name, input, output_dir, ops, options)?;
        self.add_step(step)
    }

    /// Register an already constructed step.
    pub fn add_step(&mut self, step: Step) -> Result<&mut Self> {
        if self.steps.contains_key(step.name()) {
            return Err(AssetpipeError::ConfigError(format!(
                "step '{}' is already registered",
                step.name()
            )));
        }
        debug!(step = %step.name(), input = %step.input().as_str(), "registered step");
        self.order.push(step.name().to_string());
        self.steps.insert(step.name().to_string(), Arc::new(step));
        Ok(self)
    }

    /// Append a stage to the build sequence.
    pub fn register_stage<S: AsRef<str>>(&mut self, names: &[S]) -> Result<&mut Self> {
        let stage_no = self.stages.len() + 1;
        if names.is_empty() {
            return Err(AssetpipeError::ConfigError(format!(
                "stage {stage_no} has no steps"
            )));
        }

        let mut seen = HashSet::new();
        let mut members: Vec<&Arc<Step>> = Vec::with_capacity(names.len());
        for name in names.iter().map(AsRef::as_ref) {
            let step = self.steps.get(name).ok_or_else(|| {
                AssetpipeError::ConfigError(format!(
                    "stage {stage_no} references unknown step '{name}'"
                ))
            })?;
            if !seen.insert(name) {
                return Err(AssetpipeError::ConfigError(format!(
                    "stage {stage_no} lists step '{name}' more than once"
                )));
            }
            members.push(step);
        }

        // Members run concurrently, so none may share an output tree.
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                if a.output_overlaps(b) {
                    return Err(AssetpipeError::ConfigError(format!(
                        "steps '{}' and '{}' in stage {stage_no} write to overlapping outputs ({} / {})",
                        a.name(),
                        b.name(),
                        a.output_dir().display(),
                        b.output_dir().display()
                    )));
                }
            }
        }

        self.stages.push(Stage {
            steps: names.iter().map(|n| n.as_ref().to_string()).collect(),
        });
        Ok(self)
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            steps: self.steps,
            order: self.order,
            stages: self.stages,
        }
    }
}

/// Immutable set of steps and stages, built once at startup.
#[derive(Debug)]
pub struct Pipeline {
    steps: HashMap<StepName, Arc<Step>>,
    order: Vec<StepName>,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn step(&self, name: &str) -> Option<&Arc<Step>> {
        self.steps.get(name)
    }

    /// Steps in registration order.
    pub fn steps(&self) -> impl Iterator<Item = &Arc<Step>> {
        self.order.iter().filter_map(|n| self.steps.get(n))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PipelineBuilder {
        let mut b = PipelineBuilder::new();
        b.register_step("clean", "build/**/*", "build", vec![], StepOptions::default())
            .unwrap()
            .register_step("css", "src/*.css", "build/css", vec![], StepOptions::default())
            .unwrap()
            .register_step("js", "src/*.js", "build/js", vec![], StepOptions::default())
            .unwrap();
        b
    }

    #[test]
    fn duplicate_step_is_rejected() {
        let mut b = builder();
        let err = b
            .register_step("css", "x/*", "out", vec![], StepOptions::default())
            .unwrap_err();
        assert!(matches!(err, AssetpipeError::ConfigError(ref m) if m.contains("already registered")));
    }

    #[test]
    fn stage_with_unknown_step_is_rejected() {
        let mut b = builder();
        let err = b.register_stage(&["css", "fonts"]).unwrap_err();
        assert!(matches!(err, AssetpipeError::ConfigError(ref m) if m.contains("'fonts'")));
    }

    #[test]
    fn stage_members_may_not_share_outputs() {
        let mut b = builder();
        let err = b.register_stage(&["clean", "css"]).unwrap_err();
        assert!(matches!(err, AssetpipeError::ConfigError(ref m) if m.contains("overlapping")));
    }

    #[test]
    fn stages_keep_registration_order() {
        let mut b = builder();
        b.register_stage(&["clean"]).unwrap();
        b.register_stage(&["css", "js"]).unwrap();
        let p = b.build();

        assert_eq!(p.stages().len(), 2);
        assert_eq!(p.stages()[1].steps(), ["css".to_string(), "js".to_string()]);
        let names: Vec<&str> = p.steps().map(|s| s.name()).collect();
        assert_eq!(names, ["clean", "css", "js"]);
    }
}
