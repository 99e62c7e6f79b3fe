// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling `patterns` / `exclude` globs and event kinds per binding.
//! - Wiring up a cross-platform filesystem observer (`notify`) that turns
//!   raw events into root-relative [`crate::engine::WatchChange`]s.
//!
//! It knows nothing about steps or debouncing; the engine does that.

pub mod patterns;
pub mod watcher;

pub use patterns::{build_watch_profiles, RawWatchSpec, WatchDefaults, WatchProfile};
pub use watcher::{spawn_observer, WatcherHandle};
