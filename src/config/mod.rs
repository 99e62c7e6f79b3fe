// src/config/mod.rs

//! Configuration loading and validation for assetpipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`) and turn it into a
//!   [`crate::pipeline::Pipeline`] and watch profiles.
//! - Load a config file from disk (`loader.rs`).
//! - Validate references and registrations (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, DefaultSection, OpConfig, StageConfig, StepConfig, WatchConfig,
};
pub use validate::validate_config;
