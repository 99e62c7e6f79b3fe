// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `assetpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetpipe",
    version,
    about = "Build front-end assets in stages and rebuild them on file changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Assetpipe.toml` in the current working directory. The
    /// directory containing it is the project root.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETPIPE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every stage once, in order, then exit.
    Build {
        /// Parse + validate and print the plan, but don't run any step.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the named steps strictly in the given order.
    Run {
        #[arg(required = true, value_name = "STEP")]
        steps: Vec<String>,
    },

    /// Watch the configured bindings and rebuild on changes until Ctrl-C.
    Watch {
        /// Run a full build before starting to watch.
        #[arg(long)]
        build_first: bool,
    },
}

impl CliArgs {
    /// The `--config` path, or [`default_config_path`] when omitted.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "assetpipe",
            "build",
            "--dry-run",
            "--config",
            "site/Assetpipe.toml",
        ])
        .unwrap();
        assert_eq!(args.config_path(), PathBuf::from("site/Assetpipe.toml"));
        assert!(matches!(args.command, Command::Build { dry_run: true }));
    }

    #[test]
    fn run_requires_a_step() {
        assert!(CliArgs::try_parse_from(["assetpipe", "run"]).is_err());
        let args = CliArgs::try_parse_from(["assetpipe", "run", "clean", "copy"]).unwrap();
        match args.command {
            Command::Run { steps } => assert_eq!(steps, ["clean", "copy"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_defaults_to_assetpipe_toml() {
        let args = CliArgs::try_parse_from(["assetpipe", "build"]).unwrap();
        assert!(args.config.is_none());
        assert_eq!(args.config_path(), default_config_path());
        assert_eq!(args.config_path(), PathBuf::from("Assetpipe.toml"));
    }
}
