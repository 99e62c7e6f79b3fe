// src/engine/mod.rs

//! Watch/reload orchestration engine.
//!
//! This module ties together:
//! - the per-binding debounce state machine ([`debounce`], pure)
//! - the Tokio task driving one binding ([`binding`])
//! - the default rebuild-then-reload action ([`action`])
//! - the reload broadcast hub ([`reload`])
//! - the orchestrator owning observers and bindings ([`orchestrator`])

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::types::ChangeKind;

/// A filesystem change routed to a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchChange {
    /// Path relative to the project root.
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// What a binding does once its debounce window elapses.
///
/// Production code uses [`RebuildAction`]; tests can provide their own
/// implementation that records invocations.
pub trait ChangeAction: Send + Sync {
    fn on_change(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

pub mod action;
pub mod binding;
pub mod debounce;
pub mod orchestrator;
pub mod reload;

pub use action::RebuildAction;
pub use binding::{spawn_binding, BindingHandle};
pub use debounce::{BindingCommand, BindingMachine, BindingPhase};
pub use orchestrator::Orchestrator;
pub use reload::{spawn_reload_listener, ReloadHub, ReloadSignal};
