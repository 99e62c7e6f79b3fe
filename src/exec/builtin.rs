// src/exec/builtin.rs

//! In-process collaborators.

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::info;

use super::{Artifact, Collaborator, OpContext, OpFuture, OpScope};

/// Replaces the output file name, keeping the directory part.
#[derive(Debug, Clone)]
pub struct Rename {
    file_name: String,
}

impl Rename {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Collaborator for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn output_path(&self, path: &Path) -> PathBuf {
        path.with_file_name(&self.file_name)
    }

    fn apply<'a>(&'a self, artifacts: Vec<Artifact>, _ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move {
            Ok(artifacts
                .into_iter()
                .map(|mut a| {
                    a.path.set_file_name(&self.file_name);
                    a
                })
                .collect())
        })
    }
}

/// Replaces the output extension (`main.scss` -> `main.css`).
#[derive(Debug, Clone)]
pub struct ChangeExtension {
    ext: String,
}

impl ChangeExtension {
    pub fn new(ext: impl Into<String>) -> Self {
        let ext: String = ext.into();
        Self {
            ext: ext.trim_start_matches('.').to_string(),
        }
    }
}

impl Collaborator for ChangeExtension {
    fn name(&self) -> &str {
        "ext"
    }

    fn output_path(&self, path: &Path) -> PathBuf {
        path.with_extension(&self.ext)
    }

    fn apply<'a>(&'a self, artifacts: Vec<Artifact>, _ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move {
            Ok(artifacts
                .into_iter()
                .map(|mut a| {
                    a.path.set_extension(&self.ext);
                    a
                })
                .collect())
        })
    }
}

/// Joins every artifact of the step into a single file, in path order.
#[derive(Debug, Clone)]
pub struct Concat {
    file_name: String,
}

impl Concat {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Collaborator for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn scope(&self) -> OpScope {
        OpScope::PerSet
    }

    fn output_path(&self, _path: &Path) -> PathBuf {
        PathBuf::from(&self.file_name)
    }

    fn apply<'a>(&'a self, mut artifacts: Vec<Artifact>, _ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move {
            if artifacts.is_empty() {
                return Ok(Vec::new());
            }
            artifacts.sort_by(|a, b| a.path.cmp(&b.path));

            let mut contents = Vec::new();
            for (i, artifact) in artifacts.iter().enumerate() {
                if i > 0 && !contents.ends_with(b"\n") {
                    contents.push(b'\n');
                }
                contents.extend_from_slice(&artifact.contents);
            }

            Ok(vec![Artifact::new(PathBuf::from(&self.file_name), contents)])
        })
    }
}

/// Logs the size of every artifact and passes it through unchanged.
#[derive(Debug, Clone, Default)]
pub struct ReportSize;

impl Collaborator for ReportSize {
    fn name(&self) -> &str {
        "size"
    }

    fn apply<'a>(&'a self, artifacts: Vec<Artifact>, ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move {
            for a in &artifacts {
                info!(
                    step = %ctx.step,
                    file = %a.path.display(),
                    bytes = a.contents.len(),
                    "size: {}",
                    human_size(a.contents.len())
                );
            }
            Ok(artifacts)
        })
    }
}

fn human_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "kB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Deletes the source file of every artifact and emits nothing.
///
/// This is what a clean step runs: its input glob matches the files to
/// delete. Directories left empty below the output directory are pruned.
#[derive(Debug, Clone, Default)]
pub struct RemoveSource;

impl Collaborator for RemoveSource {
    fn name(&self) -> &str {
        "remove"
    }

    fn apply<'a>(&'a self, artifacts: Vec<Artifact>, ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move {
            for a in artifacts {
                let origin = a
                    .origin
                    .ok_or_else(|| anyhow!("artifact {:?} has no source to remove", a.path))?;
                ctx.fs.remove_file(&origin)?;
                if let Some(parent) = origin.parent() {
                    ctx.fs
                        .prune_empty_dirs(parent, ctx.output_dir())
                        .with_context(|| format!("pruning dirs above {:?}", origin))?;
                }
            }
            Ok(Vec::new())
        })
    }
}
