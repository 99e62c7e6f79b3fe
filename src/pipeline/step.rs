// src/pipeline/step.rs

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};

use crate::errors::{AssetpipeError, Result};
use crate::exec::Collaborator;
use crate::fs::FileSystem;

/// Canonical step name type used throughout the crate.
pub type StepName = String;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A compiled input glob plus the literal directory it is rooted at.
///
/// Matched files keep their path relative to `base` when written to the
/// output directory, so `src/fonts/**/*.woff` writes `src/fonts/a/b.woff`
/// to `<output>/a/b.woff`.
#[derive(Clone)]
pub struct InputPattern {
    raw: String,
    base: PathBuf,
    matcher: GlobMatcher,
}

impl fmt::Debug for InputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputPattern")
            .field("raw", &self.raw)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl InputPattern {
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = raw.trim().trim_start_matches("./").to_string();
        if normalized.is_empty() {
            return Err(AssetpipeError::ConfigError(
                "input pattern must not be empty".to_string(),
            ));
        }

        let matcher = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                AssetpipeError::ConfigError(format!("invalid input pattern '{raw}': {e}"))
            })?
            .compile_matcher();

        Ok(Self {
            base: glob_base(&normalized),
            raw: normalized,
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Literal directory prefix of the pattern, relative to the project root.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Match a root-relative path using forward slashes.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.matcher.is_match(rel_path)
    }
}

/// Leading path components that contain no glob syntax. A pattern without
/// any glob syntax names a single file, so its base is the parent directory.
pub(crate) fn glob_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = pattern.split('/').collect();
    let literal = parts
        .iter()
        .take_while(|p| !p.contains(GLOB_META))
        .count();

    let take = if literal == parts.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };

    parts[..take]
        .iter()
        .filter(|p| !p.is_empty() && **p != ".")
        .collect()
}

/// Explicit precondition evaluated before a step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The path (relative to the project root) must exist.
    PathExists(PathBuf),
}

impl Guard {
    /// `Err(reason)` when the step should be skipped.
    pub fn check(&self, root: &Path, fs: &dyn FileSystem) -> std::result::Result<(), String> {
        match self {
            Guard::PathExists(path) => {
                if fs.exists(&root.join(path)) {
                    Ok(())
                } else {
                    Err(format!("{} does not exist", path.display()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    /// Skip a file when its output is at least as new as the input.
    pub skip_if_newer: bool,
    pub guard: Option<Guard>,
    /// Write nothing if any file of the step fails.
    pub all_or_nothing: bool,
}

/// A named build action. Immutable once registered.
#[derive(Clone)]
pub struct Step {
    name: StepName,
    input: InputPattern,
    output_dir: PathBuf,
    ops: Vec<Arc<dyn Collaborator>>,
    options: StepOptions,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops: Vec<&str> = self.ops.iter().map(|op| op.name()).collect();
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("input", &self.input.as_str())
            .field("output_dir", &self.output_dir)
            .field("ops", &ops)
            .field("options", &self.options)
            .finish()
    }
}

impl Step {
    pub fn new(
        name: impl Into<StepName>,
        input: &str,
        output_dir: impl AsRef<Path>,
        ops: Vec<Arc<dyn Collaborator>>,
        options: StepOptions,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AssetpipeError::ConfigError(
                "step name must not be empty".to_string(),
            ));
        }
        let input = InputPattern::new(input).map_err(|e| match e {
            AssetpipeError::ConfigError(msg) => {
                AssetpipeError::ConfigError(format!("step '{name}': {msg}"))
            }
            other => other,
        })?;

        Ok(Self {
            name,
            input,
            output_dir: normalize(output_dir.as_ref()),
            ops,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &InputPattern {
        &self.input
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn ops(&self) -> &[Arc<dyn Collaborator>] {
        &self.ops
    }

    pub fn options(&self) -> &StepOptions {
        &self.options
    }

    /// True if both steps write into the same tree (equal or nested dirs).
    pub fn output_overlaps(&self, other: &Step) -> bool {
        self.output_dir.starts_with(&other.output_dir)
            || other.output_dir.starts_with(&self.output_dir)
    }
}

/// Drop `.` components so `./build/css` and `build/css` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn base_stops_at_first_glob_component() {
        assert_eq!(glob_base("src/fonts/**/*.{ttf,woff}"), PathBuf::from("src/fonts"));
        assert_eq!(glob_base("src/img/*"), PathBuf::from("src/img"));
        assert_eq!(glob_base("*.txt"), PathBuf::new());
    }

    #[test]
    fn literal_pattern_is_based_at_parent() {
        assert_eq!(glob_base("src/js/main.js"), PathBuf::from("src/js"));
        assert_eq!(glob_base("index.html"), PathBuf::new());
    }

    #[test]
    fn star_does_not_cross_directories() {
        let p = InputPattern::new("./src/img/*").unwrap();
        assert_eq!(p.as_str(), "src/img/*");
        assert!(p.matches("src/img/logo.png"));
        assert!(!p.matches("src/img/nested/logo.png"));
    }

    #[test]
    fn empty_pattern_is_config_error() {
        let err = Step::new("x", "  ", "build", vec![], StepOptions::default()).unwrap_err();
        assert!(matches!(err, AssetpipeError::ConfigError(ref m) if m.contains("step 'x'")));
    }

    #[test]
    fn overlapping_outputs() {
        let build = Step::new("clean", "build/**", "./build", vec![], StepOptions::default()).unwrap();
        let css = Step::new("css", "src/*.css", "build/css", vec![], StepOptions::default()).unwrap();
        let js = Step::new("js", "src/*.js", "build/js", vec![], StepOptions::default()).unwrap();
        assert!(build.output_overlaps(&css));
        assert!(!css.output_overlaps(&js));
    }

    #[test]
    fn path_guard() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/icons/a.svg", "<svg/>");
        let root = Path::new("/p");

        assert!(Guard::PathExists("src/icons".into()).check(root, &fs).is_ok());
        let reason = Guard::PathExists("src/missing".into()).check(root, &fs).unwrap_err();
        assert!(reason.contains("src/missing"));
    }
}
