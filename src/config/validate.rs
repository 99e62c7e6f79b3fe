// src/config/validate.rs

use crate::config::model::ConfigFile;
use crate::errors::{AssetpipeError, Result};

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one step
/// - `debounce_ms >= 1`
/// - every `[[stage]]` and `[[watch]]` references existing steps
/// - with `[[stage]]`s configured, every step is staged or run by a binding
/// - every binding has at least one pattern
/// - the steps and stages register cleanly (globs, duplicates, overlapping
///   outputs within a stage) and the watch globs compile
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_global_config(cfg)?;
    validate_references(cfg)?;
    cfg.build_pipeline()?;
    cfg.watch_profiles()?;
    Ok(())
}

fn config_error(msg: String) -> AssetpipeError {
    AssetpipeError::ConfigError(msg)
}

fn ensure_has_steps(cfg: &ConfigFile) -> Result<()> {
    if cfg.step.is_empty() {
        return Err(config_error(
            "config must contain at least one [step.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(config_error(
            "[config].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_references(cfg: &ConfigFile) -> Result<()> {
    for (i, stage) in cfg.stage.iter().enumerate() {
        for name in &stage.steps {
            if !cfg.step.contains_key(name) {
                return Err(config_error(format!(
                    "stage {} references unknown step '{name}'",
                    i + 1
                )));
            }
        }
    }

    if !cfg.stage.is_empty() {
        for name in cfg.step.keys() {
            let staged = cfg.stage.iter().any(|s| s.steps.contains(name));
            let watched = cfg.watch.iter().any(|w| w.run.contains(name));
            if !staged && !watched {
                return Err(config_error(format!(
                    "step '{name}' is in no [[stage]] and no [[watch]] run list"
                )));
            }
        }
    }

    for (i, watch) in cfg.watch.iter().enumerate() {
        let binding = watch.display_name(i);
        if watch.patterns.is_empty() {
            return Err(config_error(format!(
                "watch binding '{binding}' has no patterns"
            )));
        }
        for name in &watch.run {
            if !cfg.step.contains_key(name) {
                return Err(config_error(format!(
                    "watch binding '{binding}' runs unknown step '{name}'"
                )));
            }
        }
    }
    Ok(())
}
