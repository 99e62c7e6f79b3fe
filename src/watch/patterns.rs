// src/watch/patterns.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::pipeline::step::glob_base;
use crate::pipeline::StepName;
use crate::types::ChangeKind;

/// Default watch configuration from `[default]` in the config.
///
/// ```toml
/// [default]
/// exclude = ["**/*.tmp", "**/.DS_Store"]
/// ```
#[derive(Debug, Clone, Default)]
pub struct WatchDefaults {
    pub exclude: Vec<String>,
}

/// Raw per-binding specification coming from the high-level config.
///
/// `exclude` is optional; `append_default_exclude` controls whether the
/// binding's own list is merged with the default list. The effective
/// patterns are computed by [`build_watch_profiles`].
#[derive(Debug, Clone)]
pub struct RawWatchSpec {
    pub name: String,
    pub patterns: Vec<String>,
    pub exclude: Option<Vec<String>>,
    pub append_default_exclude: bool,
    pub events: Vec<ChangeKind>,
    pub run: Vec<StepName>,
    pub reload: bool,
}

impl RawWatchSpec {
    pub fn new<N: Into<String>>(name: N, patterns: Vec<String>, run: Vec<StepName>) -> Self {
        Self {
            name: name.into(),
            patterns,
            exclude: None,
            append_default_exclude: false,
            events: ChangeKind::ALL.to_vec(),
            run,
            reload: false,
        }
    }
}

/// Compiled watch binding: globs, exclusions, event kinds and what to run.
///
/// Patterns are relative to the project root; the observer passes
/// root-relative, slash-separated paths into [`WatchProfile::matches`].
#[derive(Clone)]
pub struct WatchProfile {
    name: String,
    patterns: Vec<String>,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    events: Vec<ChangeKind>,
    run: Vec<StepName>,
    reload: bool,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .field("events", &self.events)
            .field("run", &self.run)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn events(&self) -> &[ChangeKind] {
        &self.events
    }

    /// Steps re-run (in this order) when the binding fires.
    pub fn run(&self) -> &[StepName] {
        &self.run
    }

    pub fn reload(&self) -> bool {
        self.reload
    }

    /// Whether a change of `kind` at `rel_path` (relative to the project
    /// root, e.g. `"src/scss/main.scss"`) concerns this binding.
    pub fn matches(&self, rel_path: &str, kind: ChangeKind) -> bool {
        if !self.events.contains(&kind) {
            return false;
        }
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Directories (relative to the project root) the observer must watch
    /// recursively: the literal prefix of every pattern, deduplicated, with
    /// nested directories folded into their ancestors.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let bases: BTreeSet<PathBuf> = self.patterns.iter().map(|p| glob_base(p)).collect();
        let mut roots: Vec<PathBuf> = Vec::new();
        for base in bases {
            if roots.iter().any(|r| base.starts_with(r)) {
                continue;
            }
            roots.push(base);
        }
        roots
    }
}

/// Build a compiled watch profile for each binding.
///
/// Exclusions follow the default + append logic:
///
/// - If `append_default_exclude = true`, the effective list is
///   `binding.exclude + default.exclude`.
/// - Else, if `binding.exclude` is Some, use only that.
/// - Else, use `default.exclude`.
pub fn build_watch_profiles(
    defaults: &WatchDefaults,
    specs: &[RawWatchSpec],
) -> Result<Vec<WatchProfile>> {
    let mut profiles = Vec::with_capacity(specs.len());

    for spec in specs {
        let exclude_patterns = effective_patterns(
            spec.exclude.as_ref(),
            &defaults.exclude,
            spec.append_default_exclude,
        );

        let watch_set = build_globset(&spec.patterns)
            .with_context(|| format!("building watch globset for binding {}", spec.name))?;

        let exclude_set = if exclude_patterns.is_empty() {
            None
        } else {
            Some(
                build_globset(&exclude_patterns).with_context(|| {
                    format!("building exclude globset for binding {}", spec.name)
                })?,
            )
        };

        let patterns = spec
            .patterns
            .iter()
            .map(|p| p.trim_start_matches("./").to_string())
            .collect();

        profiles.push(WatchProfile {
            name: spec.name.clone(),
            patterns,
            watch_set,
            exclude_set,
            events: spec.events.clone(),
            run: spec.run.clone(),
            reload: spec.reload,
        });
    }

    Ok(profiles)
}

fn effective_patterns(
    binding_list: Option<&Vec<String>>,
    default_list: &[String],
    append_default: bool,
) -> Vec<String> {
    match (binding_list, append_default) {
        (Some(list), true) => {
            let mut combined = list.clone();
            combined.extend(default_list.iter().cloned());
            combined
        }
        (Some(list), false) => list.clone(),
        (None, _) => default_list.to_vec(),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat.trim_start_matches("./"))
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
