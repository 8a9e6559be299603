//! Workbench - session orchestrator CLI
//!
//! Main entry point for the workbench command-line interface.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use workbench_config::{LoadOptions, WorkbenchConfig};

mod commands;

use commands::{build, extract, save, session, validate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Workbench - drive environment builds, extractions and file edits against a
/// remote workspace
#[derive(Parser)]
#[command(name = "workbench")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: [server] url, then http://localhost:8080)
    #[arg(long, global = true, env = "WORKBENCH_SERVER_URL")]
    pub server: Option<String>,

    /// Config file layered over the discovered ones
    #[arg(long, global = true, env = "WORKBENCH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the workspace environment
    Build(build::BuildArgs),

    /// Validate the workspace configuration
    Validate(validate::ValidateArgs),

    /// Run an extraction for a document
    Extract(extract::ExtractArgs),

    /// Upload a local file over a workspace file
    Save(save::SaveArgs),

    /// Inspect or reset the persisted editor session
    Session(session::SessionArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = workbench_config::load_config_with_options(LoadOptions {
        explicit: cli.config.as_deref(),
        ..Default::default()
    })
    .context("failed to load configuration")?;

    let _guard = init_tracing(&loaded.config, cli.verbose);
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }

    let ctx = commands::Context {
        config: loaded.config,
        server_url: cli.server,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Build(args) => build::run(args, &ctx).await,
        Commands::Validate(args) => validate::run(args, &ctx).await,
        Commands::Extract(args) => extract::run(args, &ctx).await,
        Commands::Save(args) => save::run(args, &ctx).await,
        Commands::Session(args) => session::run(args, &ctx).await,
    }
}

/// Console (human-readable, stderr) plus an optional daily JSON file under
/// the state directory. `RUST_LOG` overrides the console filter.
fn init_tracing(config: &WorkbenchConfig, verbose: bool) -> Option<WorkerGuard> {
    let logging = config.logging();
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let console_filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| format!("workbench={level},warn"));

    let (file_layer, guard) = if logging.file {
        let log_dir = config.session().effective_state_dir().join("logs");
        let appender = tracing_appender::rolling::daily(&log_dir, "workbench.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(EnvFilter::new("workbench=trace,info"));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::new(console_filter)),
        )
        .with(file_layer)
        .init();

    guard
}
