// src/pipeline/mod.rs

//! Task graph: steps, stages and their execution.
//!
//! - [`step`] defines a single named step (input glob, output directory,
//!   ordered collaborators, options).
//! - [`registry`] validates registrations and freezes them into an
//!   immutable [`Pipeline`].
//! - [`runner`] executes steps, stages and ad hoc sequences.
//! - [`outcome`] holds the typed per-file and per-step results.

pub mod outcome;
pub mod registry;
pub mod runner;
pub mod step;

pub use outcome::{BuildReport, FileCounts, FileOutcome, SkipReason, StepReport, StepStatus};
pub use registry::{Pipeline, PipelineBuilder, Stage};
pub use runner::Runner;
pub use step::{Guard, InputPattern, Step, StepName, StepOptions};
