// src/engine/binding.rs

//! Async shell around [`BindingMachine`]: one Tokio task per watch binding.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::debounce::{BindingCommand, BindingMachine, BindingPhase};
use super::{ChangeAction, WatchChange};

/// Capacity of a binding's change channel. Changes are coalesced anyway, so
/// a full channel just means a trigger is already on its way.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Handle to a running binding task.
#[derive(Debug)]
pub struct BindingHandle {
    name: String,
    tx: mpsc::Sender<WatchChange>,
    join: JoinHandle<u64>,
}

impl BindingHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sender that feeds change events into this binding.
    pub fn sender(&self) -> mpsc::Sender<WatchChange> {
        self.tx.clone()
    }

    /// Wait for the binding task to end; returns the number of runs started.
    pub async fn join(self) -> u64 {
        drop(self.tx);
        self.join.await.unwrap_or(0)
    }
}

/// Spawn the binding loop. The loop ends when `shutdown` flips to `true` or
/// every change sender is dropped; a run in progress at that point is
/// allowed to finish.
pub fn spawn_binding(
    name: impl Into<String>,
    window: Duration,
    action: Arc<dyn ChangeAction>,
    shutdown: watch::Receiver<bool>,
) -> BindingHandle {
    let name = name.into();
    let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
    let machine = BindingMachine::new(window);
    let join = tokio::spawn(binding_loop(name.clone(), rx, machine, action, shutdown));
    BindingHandle { name, tx, join }
}

async fn binding_loop(
    name: String,
    mut rx: mpsc::Receiver<WatchChange>,
    mut machine: BindingMachine,
    action: Arc<dyn ChangeAction>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    debug!(binding = %name, "binding loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        match machine.phase() {
            BindingPhase::Idle => {
                tokio::select! {
                    change = rx.recv() => match change {
                        Some(change) => {
                            debug!(binding = %name, ?change, "change detected; debouncing");
                            machine.on_change(Instant::now());
                        }
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
            BindingPhase::Debouncing { deadline } => {
                tokio::select! {
                    change = rx.recv() => match change {
                        Some(change) => {
                            debug!(binding = %name, ?change, "change during debounce; timer reset");
                            machine.on_change(Instant::now());
                        }
                        None => break,
                    },
                    _ = sleep_until(deadline) => {
                        machine.on_deadline(Instant::now());
                    }
                    _ = shutdown.changed() => break,
                }
            }
            BindingPhase::Running { .. } => {
                run_until_settled(&name, &mut rx, &mut machine, action.as_ref(), &mut shutdown).await;
            }
        }
    }

    debug!(binding = %name, runs = machine.runs_started(), "binding loop finished");
    machine.runs_started()
}

/// Run the action, keep listening for changes while it runs, and start at
/// most one follow-up run per completed run. Returns with the machine Idle.
async fn run_until_settled(
    name: &str,
    rx: &mut mpsc::Receiver<WatchChange>,
    machine: &mut BindingMachine,
    action: &dyn ChangeAction,
    shutdown: &mut watch::Receiver<bool>,
) {
    let mut listening = true;

    loop {
        info!(binding = %name, run = machine.runs_started(), "running binding action");
        let run = action.on_change();
        tokio::pin!(run);

        loop {
            tokio::select! {
                _ = &mut run => break,
                change = rx.recv(), if listening => match change {
                    Some(change) => {
                        debug!(binding = %name, ?change, "change while running; re-run queued");
                        machine.on_change(Instant::now());
                    }
                    None => {
                        listening = false;
                        machine.cancel_pending();
                    }
                },
                _ = shutdown.changed(), if listening => {
                    listening = false;
                    machine.cancel_pending();
                }
            }
        }

        if machine.on_run_finished() != BindingCommand::StartRun {
            return;
        }
    }
}
