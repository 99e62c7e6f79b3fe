// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::{AssetpipeError, Result};

/// Load a configuration file from a given path and return the raw `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        AssetpipeError::ConfigError(format!("reading config file {}: {e}", path.display()))
    })?;

    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the entry point for the rest of the application. Afterwards
/// `ConfigFile::build_pipeline` and `ConfigFile::watch_profiles` cannot
/// fail for reasons the validation already covers.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

/// `Assetpipe.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Assetpipe.toml")
}

/// The project root: the directory containing the config file, or `.`.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_config_directory() {
        assert_eq!(config_root_dir(Path::new("site/Assetpipe.toml")), PathBuf::from("site"));
        assert_eq!(config_root_dir(Path::new("Assetpipe.toml")), PathBuf::from("."));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_from_path("/definitely/not/here/Assetpipe.toml").unwrap_err();
        assert!(matches!(err, AssetpipeError::ConfigError(_)));
    }
}
