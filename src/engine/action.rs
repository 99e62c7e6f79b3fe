// src/engine/action.rs

use std::future::Future;
use std::pin::Pin;

use tracing::{error, info, warn};

use super::reload::ReloadHub;
use super::ChangeAction;
use crate::pipeline::{Runner, StepName};

/// Default binding action: re-run the bound steps in order, print one
/// status line per step, then broadcast a reload if the sequence succeeded.
///
/// An empty step list with `reload` set means "just reload" (e.g. HTML
/// files served straight from the source tree).
#[derive(Debug, Clone)]
pub struct RebuildAction {
    binding: String,
    runner: Runner,
    steps: Vec<StepName>,
    reload: Option<ReloadHub>,
}

impl RebuildAction {
    pub fn new(
        binding: impl Into<String>,
        runner: Runner,
        steps: Vec<StepName>,
        reload: Option<ReloadHub>,
    ) -> Self {
        Self {
            binding: binding.into(),
            runner,
            steps,
            reload,
        }
    }

    /// Run the steps and report whether everything succeeded.
    pub async fn rebuild(&self) -> bool {
        if self.steps.is_empty() {
            return true;
        }

        match self.runner.run_sequence(&self.steps).await {
            Ok(report) => {
                for step in &report.steps {
                    println!("[{}] {}", self.binding, step.summary_line());
                }
                if report.is_success() {
                    true
                } else {
                    warn!(
                        binding = %self.binding,
                        failed = ?report.failed_steps(),
                        not_run = ?report.not_run,
                        "rebuild failed; still watching"
                    );
                    false
                }
            }
            Err(err) => {
                error!(binding = %self.binding, error = %err, "rebuild could not start");
                false
            }
        }
    }
}

impl ChangeAction for RebuildAction {
    fn on_change(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let ok = self.rebuild().await;
            match (&self.reload, ok) {
                (Some(hub), true) => {
                    hub.reload();
                }
                (Some(_), false) => {
                    info!(binding = %self.binding, "reload suppressed after failed rebuild");
                }
                (None, _) => {}
            }
        })
    }
}
