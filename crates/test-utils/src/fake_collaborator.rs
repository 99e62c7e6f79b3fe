use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use assetpipe::exec::{Artifact, Collaborator, OpContext, OpFuture, OpScope};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
}

#[derive(Debug, Clone)]
pub struct Mark {
    pub label: String,
    pub phase: Phase,
    pub at: Instant,
}

/// Shared record of when instrumented collaborators started and ended.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    marks: Arc<Mutex<Vec<Mark>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, label: &str, phase: Phase) {
        self.marks.lock().unwrap().push(Mark {
            label: label.to_string(),
            phase,
            at: Instant::now(),
        });
    }

    pub fn marks(&self) -> Vec<Mark> {
        self.marks.lock().unwrap().clone()
    }

    /// Labels in the order their collaborator started.
    pub fn start_order(&self) -> Vec<String> {
        self.marks()
            .into_iter()
            .filter(|m| m.phase == Phase::Start)
            .map(|m| m.label)
            .collect()
    }

    /// Earliest start and latest end recorded for `label`.
    pub fn span(&self, label: &str) -> Option<(Instant, Instant)> {
        let marks = self.marks();
        let start = marks
            .iter()
            .filter(|m| m.label == label && m.phase == Phase::Start)
            .map(|m| m.at)
            .min()?;
        let end = marks
            .iter()
            .filter(|m| m.label == label && m.phase == Phase::End)
            .map(|m| m.at)
            .max()?;
        Some((start, end))
    }
}

/// Passthrough collaborator that records start/end marks and takes `delay`.
///
/// Runs once per step (per-set scope) so each step yields exactly one span.
#[derive(Debug, Clone)]
pub struct Instrumented {
    label: String,
    delay: Duration,
    timeline: Timeline,
}

impl Instrumented {
    pub fn new(label: &str, delay: Duration, timeline: &Timeline) -> Arc<dyn Collaborator> {
        Arc::new(Self {
            label: label.to_string(),
            delay,
            timeline: timeline.clone(),
        })
    }
}

impl Collaborator for Instrumented {
    fn name(&self) -> &str {
        &self.label
    }

    fn scope(&self) -> OpScope {
        OpScope::PerSet
    }

    fn apply<'a>(&'a self, artifacts: Vec<Artifact>, _ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move {
            self.timeline.record(&self.label, Phase::Start);
            tokio::time::sleep(self.delay).await;
            self.timeline.record(&self.label, Phase::End);
            Ok(artifacts)
        })
    }
}

/// Per-file collaborator that always fails.
#[derive(Debug, Clone)]
pub struct AlwaysFail;

impl AlwaysFail {
    pub fn new() -> Arc<dyn Collaborator> {
        Arc::new(AlwaysFail)
    }
}

impl Collaborator for AlwaysFail {
    fn name(&self) -> &str {
        "always-fail"
    }

    fn apply<'a>(&'a self, _artifacts: Vec<Artifact>, _ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move { Err::<Vec<Artifact>, _>(anyhow!("simulated failure")) })
    }
}
