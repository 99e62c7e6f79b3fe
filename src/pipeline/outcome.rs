// src/pipeline/outcome.rs

//! Typed results of step execution.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::step::StepName;

/// Why a file (or a whole step) was not processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `skip_if_newer` is set and the output is at least as new as the input.
    OutputUpToDate { output: PathBuf },
    /// The step is `all_or_nothing` and another file failed.
    SiblingFailed,
}

/// Per-file result of a step run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Processed { source: PathBuf, outputs: Vec<PathBuf> },
    Skipped { source: PathBuf, reason: SkipReason },
    Failed { source: PathBuf, error: String },
}

impl FileOutcome {
    pub fn source(&self) -> &PathBuf {
        match self {
            FileOutcome::Processed { source, .. }
            | FileOutcome::Skipped { source, .. }
            | FileOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    /// A guard did not hold; counts as success.
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of one `run_step` invocation.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: StepName,
    pub status: StepStatus,
    pub files: Vec<FileOutcome>,
    pub started: Instant,
    pub elapsed: Duration,
}

impl StepReport {
    pub(crate) fn finish(step: &str, started: Instant, files: Vec<FileOutcome>) -> Self {
        let failed = files.iter().filter(|f| f.is_failed()).count();
        let status = if failed == 0 {
            StepStatus::Succeeded
        } else {
            StepStatus::Failed {
                reason: format!("{failed} file(s) failed"),
            }
        };
        Self {
            step: step.to_string(),
            status,
            files,
            started,
            elapsed: started.elapsed(),
        }
    }

    pub(crate) fn with_status(step: &str, started: Instant, status: StepStatus) -> Self {
        Self {
            step: step.to_string(),
            status,
            files: Vec::new(),
            started,
            elapsed: started.elapsed(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, StepStatus::Failed { .. })
    }

    pub fn counts(&self) -> FileCounts {
        let mut counts = FileCounts::default();
        for f in &self.files {
            match f {
                FileOutcome::Processed { .. } => counts.processed += 1,
                FileOutcome::Skipped { .. } => counts.skipped += 1,
                FileOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// One human-readable line, used for build summaries and watch status.
    pub fn summary_line(&self) -> String {
        let c = self.counts();
        let label = match &self.status {
            StepStatus::Succeeded => "ok".to_string(),
            StepStatus::Skipped { reason } => format!("skipped ({reason})"),
            StepStatus::Failed { reason } => format!("FAILED ({reason})"),
        };
        format!(
            "{:<16} {:<8} {} processed, {} skipped, {} failed ({} ms)",
            self.step,
            label,
            c.processed,
            c.skipped,
            c.failed,
            self.elapsed.as_millis()
        )
    }
}

/// Result of `run_all` / `run_sequence`.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub steps: Vec<StepReport>,
    /// Steps never started because an earlier stage (or step) failed.
    pub not_run: Vec<StepName>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.is_success())
    }

    pub fn failed_steps(&self) -> Vec<StepName> {
        self.steps
            .iter()
            .filter(|s| !s.is_success())
            .map(|s| s.step.clone())
            .collect()
    }

    pub fn report(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == name)
    }

    pub fn print_summary(&self) {
        println!("steps ({}):", self.steps.len());
        for step in &self.steps {
            println!("  {}", step.summary_line());
            for file in step.files.iter().filter(|f| f.is_failed()) {
                if let FileOutcome::Failed { source, error } = file {
                    println!("      {}: {}", source.display(), error);
                }
            }
        }
        if !self.not_run.is_empty() {
            println!("not run: {}", self.not_run.join(", "));
        }
    }
}
