// src/exec/mod.rs

//! Collaborator layer.
//!
//! A collaborator is an opaque transformation applied to the artifacts of a
//! step. The pipeline core only knows a collaborator's name, its scope and
//! that it turns a list of artifacts into another list (or fails).
//!
//! - [`command`] pipes artifacts through external shell commands
//!   (compilers, transpilers, optimisers) using `tokio::process`.
//! - [`builtin`] holds the small in-process operations: rename, extension
//!   change, concatenation, size reporting and source removal.
//! - [`sprite`] merges SVG icons into a single symbol sprite.

pub mod builtin;
pub mod command;
pub mod sprite;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

use crate::fs::FileSystem;

pub use builtin::{ChangeExtension, Concat, RemoveSource, Rename, ReportSize};
pub use command::{run_shell, ShellCommand};
pub use sprite::SvgSprite;

/// A file flowing through a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Output path, relative to the step's output directory.
    pub path: PathBuf,
    pub contents: Vec<u8>,
    /// The source file this artifact was read from, if any.
    pub origin: Option<PathBuf>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// File name of the output path, lossily converted.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// How a collaborator consumes the artifacts of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpScope {
    /// Applied to every matched file independently; a failure only affects
    /// that file.
    PerFile,
    /// Applied once to every surviving artifact of the step; a failure
    /// affects all of them.
    PerSet,
}

/// Information a collaborator may need about the step it runs in.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub step: String,
    /// Absolute output directory of the step.
    pub output_dir: PathBuf,
    pub fs: Arc<dyn FileSystem>,
}

impl OpContext {
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

pub type OpFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Artifact>>> + Send + 'a>>;

/// Trait abstracting a transformation collaborator.
///
/// Production code uses the implementations in this module; tests can
/// provide their own, e.g. to record start/end times.
pub trait Collaborator: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn scope(&self) -> OpScope {
        OpScope::PerFile
    }

    /// Where an artifact at `path` ends up after this collaborator, without
    /// running it. Used to find existing outputs for `skip_if_newer`.
    fn output_path(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    fn apply<'a>(&'a self, artifacts: Vec<Artifact>, ctx: &'a OpContext) -> OpFuture<'a>;
}
