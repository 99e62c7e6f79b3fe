// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{config_root_dir, load_and_validate, ConfigFile};
use crate::engine::{spawn_reload_listener, ChangeAction, Orchestrator, RebuildAction, ReloadHub};
use crate::errors::{AssetpipeError, Result};
use crate::fs::RealFileSystem;
use crate::pipeline::{BuildReport, Runner};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (the config file's directory is the project root)
/// - pipeline + runner
/// - for `watch`: orchestrator, reload hub and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config_path();
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);

    match args.command {
        Command::Build { dry_run: true } => {
            print_dry_run(&cfg, &root);
            Ok(())
        }
        Command::Build { dry_run: false } => {
            let runner = build_runner(&cfg, &root)?;
            let report = runner.run_all().await;
            report.print_summary();
            into_result(report)
        }
        Command::Run { steps } => {
            let runner = build_runner(&cfg, &root)?;
            let report = runner.run_sequence(&steps).await?;
            report.print_summary();
            into_result(report)
        }
        Command::Watch { build_first } => {
            let runner = build_runner(&cfg, &root)?;
            watch(&cfg, runner, build_first).await
        }
    }
}

/// Runner over the real filesystem for this config.
pub fn build_runner(cfg: &ConfigFile, root: &Path) -> Result<Runner> {
    let pipeline = Arc::new(cfg.build_pipeline()?);
    Ok(Runner::new(pipeline, Arc::new(RealFileSystem), root))
}

fn into_result(report: BuildReport) -> Result<()> {
    if report.is_success() {
        Ok(())
    } else {
        Err(AssetpipeError::StepExecution {
            failed: report.failed_steps(),
        })
    }
}

async fn watch(cfg: &ConfigFile, runner: Runner, build_first: bool) -> Result<()> {
    if cfg.watch.is_empty() {
        return Err(AssetpipeError::ConfigError(
            "no [[watch]] bindings configured".to_string(),
        ));
    }

    if build_first {
        let report = runner.run_all().await;
        report.print_summary();
        if !report.is_success() {
            warn!(failed = ?report.failed_steps(), "initial build failed; watching anyway");
        }
    }

    let hub = ReloadHub::new();
    let listener = spawn_reload_listener(&hub, cfg.config.reload_cmd.clone());

    let mut orchestrator = Orchestrator::new(runner.root(), cfg.config.debounce());
    let active = orchestrator.watch_all(cfg.watch_profiles()?, |profile| {
        let reload = profile.reload().then(|| hub.clone());
        Arc::new(RebuildAction::new(
            profile.name(),
            runner.clone(),
            profile.run().to_vec(),
            reload,
        )) as Arc<dyn ChangeAction>
    });

    if active == 0 {
        orchestrator.stop().await;
        return Err(AssetpipeError::ConfigError(
            "no watch binding could be started".to_string(),
        ));
    }

    info!(
        bindings = active,
        debounce_ms = orchestrator.debounce().as_millis() as u64,
        "watching; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;

    info!("shutdown requested");
    orchestrator.stop().await;
    drop(hub);
    if let Err(err) = listener.await {
        debug!(error = %err, "reload listener ended abnormally");
    }
    Ok(())
}

/// Print the resolved plan: stages, steps with their ops and options, and
/// watch bindings.
fn print_dry_run(cfg: &ConfigFile, root: &Path) {
    println!("assetpipe dry-run");
    println!("  root = {}", root.display());
    println!("  config.debounce_ms = {}", cfg.config.debounce_ms);
    if let Some(cmd) = &cfg.config.reload_cmd {
        println!("  config.reload_cmd = {cmd}");
    }
    println!();

    let stages = cfg.effective_stages();
    println!("stages ({}):", stages.len());
    for (i, stage) in stages.iter().enumerate() {
        println!("  {}. {}", i + 1, stage.join(", "));
    }
    println!();

    println!("steps ({}):", cfg.step.len());
    for (name, step) in &cfg.step {
        println!("  - {name}");
        println!("      input: {}", step.input);
        println!("      output: {}", step.output.display());
        if !step.ops.is_empty() {
            let ops: Vec<String> = step.ops.iter().map(|op| op.describe()).collect();
            println!("      ops: {}", ops.join(" | "));
        }
        if step.skip_if_newer {
            println!("      skip_if_newer: true");
        }
        if let Some(path) = &step.when_exists {
            println!("      when_exists: {}", path.display());
        }
        if step.all_or_nothing {
            println!("      all_or_nothing: true");
        }
    }

    if !cfg.watch.is_empty() {
        println!();
        println!("watch ({}):", cfg.watch.len());
        for (i, w) in cfg.watch.iter().enumerate() {
            println!("  - {}", w.display_name(i));
            println!("      patterns: {:?}", w.patterns);
            if let Some(exclude) = &w.exclude {
                println!("      exclude: {exclude:?}");
            }
            println!("      events: {:?}", w.events);
            if !w.run.is_empty() {
                println!("      run: {}", w.run.join(" -> "));
            }
            if w.reload {
                println!("      reload: true");
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
