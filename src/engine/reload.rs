// src/engine/reload.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::exec::run_shell;

/// Capacity of the broadcast ring. Lagging observers just miss older
/// signals, which is harmless since every signal means the same thing.
const RELOAD_CHANNEL_CAPACITY: usize = 16;

/// "Something changed; refresh." Carries a sequence number for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSignal {
    pub seq: u64,
}

/// One-way reload notification to any number of observers. Clones share
/// the channel and the sequence counter.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadSignal>,
    seq: Arc<AtomicU64>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(RELOAD_CHANNEL_CAPACITY);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Fire-and-forget broadcast. Returns how many observers were notified;
    /// with none connected this is a no-op returning 0.
    pub fn reload(&self) -> usize {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;

        match self.tx.send(ReloadSignal { seq }) {
            Ok(n) => {
                info!(observers = n, seq, "reload broadcast");
                n
            }
            Err(_) => {
                debug!("reload requested with no connected observers");
                0
            }
        }
    }
}

/// Subscribe a listener that logs every reload and, if `cmd` is set, runs
/// it as a shell command. The task ends once every hub clone is dropped.
pub fn spawn_reload_listener(hub: &ReloadHub, cmd: Option<String>) -> JoinHandle<()> {
    let mut rx = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(signal) => {
                    println!("reload #{}", signal.seq);
                    if let Some(cmd) = &cmd {
                        if let Err(err) = run_shell(cmd).await {
                            warn!(error = %err, "reload command failed");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "reload listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
