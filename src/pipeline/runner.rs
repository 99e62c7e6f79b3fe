// src/pipeline/runner.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use super::outcome::{BuildReport, FileOutcome, SkipReason, StepReport, StepStatus};
use super::registry::Pipeline;
use super::step::Step;
use crate::errors::{AssetpipeError, Result};
use crate::exec::{Artifact, OpContext, OpScope};
use crate::fs::FileSystem;

/// Artifacts that share a lineage of source files. Per-file ops keep one
/// lane per source; a per-set op merges every lane into one.
#[derive(Debug)]
struct Lane {
    sources: Vec<PathBuf>,
    artifacts: Vec<Artifact>,
}

/// Executes steps of a [`Pipeline`] against a project root.
///
/// Cheap to clone; stage members are spawned with their own clone.
#[derive(Clone)]
pub struct Runner {
    pipeline: Arc<Pipeline>,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Runner {
    pub fn new(pipeline: Arc<Pipeline>, fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            fs,
            root: root.into(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a single step. Only an unknown name is an `Err`; execution
    /// problems are reported in the returned [`StepReport`].
    pub async fn run_step(&self, name: &str) -> Result<StepReport> {
        let step = self
            .pipeline
            .step(name)
            .cloned()
            .ok_or_else(|| AssetpipeError::StepNotFound(name.to_string()))?;
        Ok(self.execute(&step).await)
    }

    /// Run every stage in order. Stage members run concurrently; after a
    /// stage with a failed step no further stage is started.
    pub async fn run_all(&self) -> BuildReport {
        let mut report = BuildReport::default();

        for (index, stage) in self.pipeline.stages().iter().enumerate() {
            if !report.is_success() {
                report.not_run.extend(stage.steps().iter().cloned());
                continue;
            }

            info!(stage = index + 1, steps = ?stage.steps(), "starting stage");

            let handles: Vec<_> = stage
                .steps()
                .iter()
                .filter_map(|name| self.pipeline.step(name).cloned())
                .map(|step| {
                    let runner = self.clone();
                    let name = step.name().to_string();
                    let handle = tokio::spawn(async move { runner.execute(&step).await });
                    (name, handle)
                })
                .collect();

            for (name, handle) in handles {
                let step_report = match handle.await {
                    Ok(r) => r,
                    Err(err) => {
                        error!(step = %name, error = %err, "step task aborted");
                        StepReport::with_status(
                            &name,
                            Instant::now(),
                            StepStatus::Failed {
                                reason: format!("step task aborted: {err}"),
                            },
                        )
                    }
                };
                report.steps.push(step_report);
            }

            if !report.is_success() {
                warn!(
                    stage = index + 1,
                    failed = ?report.failed_steps(),
                    "stage failed; later stages will not start"
                );
            }
        }

        report
    }

    /// Run the named steps one after another, ignoring stage membership.
    /// Stops at the first failing step.
    pub async fn run_sequence<S: AsRef<str>>(&self, names: &[S]) -> Result<BuildReport> {
        let steps = names
            .iter()
            .map(|n| {
                self.pipeline
                    .step(n.as_ref())
                    .cloned()
                    .ok_or_else(|| AssetpipeError::StepNotFound(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut report = BuildReport::default();
        for step in steps {
            if !report.is_success() {
                report.not_run.push(step.name().to_string());
                continue;
            }
            report.steps.push(self.execute(&step).await);
        }
        Ok(report)
    }

    async fn execute(&self, step: &Step) -> StepReport {
        let started = Instant::now();
        info!(step = %step.name(), input = %step.input().as_str(), "starting step");

        if let Some(guard) = &step.options().guard {
            if let Err(reason) = guard.check(&self.root, self.fs.as_ref()) {
                info!(step = %step.name(), %reason, "guard not satisfied; skipping step");
                return StepReport::with_status(step.name(), started, StepStatus::Skipped { reason });
            }
        }

        let report = match self.process(step).await {
            Ok(files) => StepReport::finish(step.name(), started, files),
            Err(err) => {
                error!(step = %step.name(), error = %format!("{err:#}"), "step failed");
                StepReport::with_status(
                    step.name(),
                    started,
                    StepStatus::Failed {
                        reason: format!("{err:#}"),
                    },
                )
            }
        };

        let counts = report.counts();
        if report.is_success() {
            info!(
                step = %step.name(),
                processed = counts.processed,
                skipped = counts.skipped,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "step finished"
            );
        } else {
            warn!(step = %step.name(), failed = counts.failed, "step finished with failures");
        }
        report
    }

    /// Files matching the step's input, sorted.
    fn resolve_inputs(&self, step: &Step) -> anyhow::Result<Vec<PathBuf>> {
        let base = self.root.join(step.input().base());
        let mut matched: Vec<PathBuf> = self
            .fs
            .list_files(&base)?
            .into_iter()
            .filter(|path| {
                relative_slash(&self.root, path)
                    .map(|rel| step.input().matches(&rel))
                    .unwrap_or(false)
            })
            .collect();
        matched.sort();
        Ok(matched)
    }

    fn up_to_date(&self, source: &Path, output: &Path) -> bool {
        match (self.fs.modified(source), self.fs.modified(output)) {
            (Some(src), Some(out)) => out >= src,
            _ => false,
        }
    }

    /// For each source, the output that makes it skippable under
    /// `skip_if_newer`. A step with a per-set op is skipped as a whole: only
    /// when every source predicts the same output and that output is at
    /// least as new as all of them.
    fn fresh_outputs(
        &self,
        step: &Step,
        base: &Path,
        output_dir: &Path,
        sources: &[PathBuf],
    ) -> Vec<Option<PathBuf>> {
        if !step.options().skip_if_newer {
            return vec![None; sources.len()];
        }

        let outputs: Vec<PathBuf> = sources
            .iter()
            .map(|source| {
                let rel = source.strip_prefix(base).unwrap_or(source);
                output_dir.join(predicted_output(step, rel))
            })
            .collect();

        let per_set = step.ops().iter().any(|op| op.scope() == OpScope::PerSet);
        if !per_set {
            return sources
                .iter()
                .zip(outputs)
                .map(|(source, output)| self.up_to_date(source, &output).then_some(output))
                .collect();
        }

        let Some(first) = outputs.first() else {
            return Vec::new();
        };
        let single = outputs.iter().all(|o| o == first);
        if single && sources.iter().all(|source| self.up_to_date(source, first)) {
            vec![Some(first.clone()); sources.len()]
        } else {
            if !single {
                debug!(step = %step.name(), "per-set output not predictable; processing every file");
            }
            vec![None; sources.len()]
        }
    }

    async fn process(&self, step: &Step) -> anyhow::Result<Vec<FileOutcome>> {
        let sources = self
            .resolve_inputs(step)
            .with_context(|| format!("resolving input '{}'", step.input().as_str()))?;

        if sources.is_empty() {
            info!(step = %step.name(), pattern = %step.input().as_str(), "no files match; nothing to do");
            return Ok(Vec::new());
        }

        let base = self.root.join(step.input().base());
        let output_dir = self.root.join(step.output_dir());
        let mut outcomes = Vec::new();
        let mut lanes = Vec::new();

        let fresh = self.fresh_outputs(step, &base, &output_dir, &sources);

        for (source, fresh) in sources.into_iter().zip(fresh) {
            let rel = source.strip_prefix(&base).unwrap_or(&source).to_path_buf();

            if let Some(output) = fresh {
                debug!(step = %step.name(), file = %rel.display(), "output up to date; skipping");
                outcomes.push(FileOutcome::Skipped {
                    source,
                    reason: SkipReason::OutputUpToDate { output },
                });
                continue;
            }

            match self.fs.read(&source) {
                Ok(contents) => lanes.push(Lane {
                    artifacts: vec![Artifact::new(rel, contents).with_origin(&source)],
                    sources: vec![source],
                }),
                Err(err) => outcomes.push(FileOutcome::Failed {
                    source,
                    error: format!("{err:#}"),
                }),
            }
        }

        let ctx = OpContext {
            step: step.name().to_string(),
            output_dir: output_dir.clone(),
            fs: Arc::clone(&self.fs),
        };

        for op in step.ops() {
            if lanes.is_empty() {
                break;
            }
            debug!(step = %step.name(), op = op.name(), lanes = lanes.len(), "applying operation");

            let inputs = match op.scope() {
                OpScope::PerFile => lanes,
                OpScope::PerSet => vec![merge_lanes(lanes)],
            };

            let mut next = Vec::with_capacity(inputs.len());
            for lane in inputs {
                match op.apply(lane.artifacts, &ctx).await {
                    Ok(artifacts) => next.push(Lane {
                        sources: lane.sources,
                        artifacts,
                    }),
                    Err(err) => {
                        let error = format!("{}: {err:#}", op.name());
                        warn!(step = %step.name(), %error, files = lane.sources.len(), "operation failed");
                        outcomes.extend(lane.sources.into_iter().map(|source| FileOutcome::Failed {
                            source,
                            error: error.clone(),
                        }));
                    }
                }
            }
            lanes = next;
        }

        if step.options().all_or_nothing && outcomes.iter().any(FileOutcome::is_failed) {
            warn!(step = %step.name(), "all_or_nothing step has failures; writing nothing");
            outcomes.extend(lanes.into_iter().flat_map(|lane| {
                lane.sources.into_iter().map(|source| FileOutcome::Skipped {
                    source,
                    reason: SkipReason::SiblingFailed,
                })
            }));
        } else {
            let needs_dir = lanes.iter().any(|l| !l.artifacts.is_empty());
            if needs_dir && !self.fs.exists(&output_dir) {
                self.fs.create_dir_all(&output_dir)?;
            }
            for lane in lanes {
                outcomes.extend(self.write_lane(&output_dir, lane));
            }
        }

        outcomes.sort_by(|a, b| a.source().cmp(b.source()));
        Ok(outcomes)
    }

    fn write_lane(&self, output_dir: &Path, lane: Lane) -> Vec<FileOutcome> {
        let mut written = Vec::with_capacity(lane.artifacts.len());
        for artifact in &lane.artifacts {
            let dest = output_dir.join(&artifact.path);
            if let Err(err) = self.fs.write(&dest, &artifact.contents) {
                let error = format!("{err:#}");
                return lane
                    .sources
                    .into_iter()
                    .map(|source| FileOutcome::Failed {
                        source,
                        error: error.clone(),
                    })
                    .collect();
            }
            written.push(dest);
        }
        lane.sources
            .into_iter()
            .map(|source| FileOutcome::Processed {
                source,
                outputs: written.clone(),
            })
            .collect()
    }
}

/// Output path of `rel` once every op of the step has renamed it.
fn predicted_output(step: &Step, rel: &Path) -> PathBuf {
    step.ops()
        .iter()
        .fold(rel.to_path_buf(), |path, op| op.output_path(&path))
}

fn merge_lanes(lanes: Vec<Lane>) -> Lane {
    let mut merged = Lane {
        sources: Vec::new(),
        artifacts: Vec::new(),
    };
    for lane in lanes {
        merged.sources.extend(lane.sources);
        merged.artifacts.extend(lane.artifacts);
    }
    merged
}

/// Path relative to `root` with forward slashes, for glob matching.
pub(crate) fn relative_slash(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
