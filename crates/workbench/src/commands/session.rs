//! Session command - inspects or resets the persisted editor session.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use serde::Serialize;
use workbench_session::{
    ConsoleSnapshot, ConsoleState, TabSessionSnapshot, load_console_snapshot,
};

use super::Context;

/// Arguments for the session command.
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: Option<SessionCommand>,

    /// Workspace to inspect (default: [session] workspace)
    #[arg(long, global = true)]
    pub workspace: Option<String>,

    /// Document to inspect (default: [session] document)
    #[arg(long, global = true)]
    pub document: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Show the stored tabs and console layout (default)
    Show,

    /// Forget the stored tabs and console layout
    Clear,
}

/// Session for JSON output.
#[derive(Debug, Serialize)]
struct SessionOutput {
    workspace: String,
    document: String,
    tabs: TabSessionSnapshot,
    console: ConsoleSnapshot,
}

/// Run the session command.
pub async fn run(args: SessionArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(SessionCommand::Show) {
        SessionCommand::Show => show(ctx, args.workspace.as_deref(), args.document.as_deref()),
        SessionCommand::Clear => clear(ctx, args.workspace.as_deref(), args.document.as_deref()),
    }
}

fn show(ctx: &Context, workspace: Option<&str>, document: Option<&str>) -> Result<()> {
    let scope = ctx.scope(workspace, document);
    let backend = ctx.backend();
    let console_config = ctx.config.console();

    let tabs = scope.tabs(backend.clone()).get()?.unwrap_or_default();
    let console = load_console_snapshot(&scope.console(backend), console_config.container_px)
        .unwrap_or_else(|| ConsoleSnapshot::new(console_config.default_fraction, ConsoleState::default()));

    if ctx.json_output {
        let output = SessionOutput {
            workspace: scope.workspace().to_string(),
            document: scope.document().to_string(),
            tabs,
            console,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let cyan = Style::new().cyan();

    println!();
    println!(
        "{} {}",
        style("Session").bold(),
        dim.apply_to(format!("{}/{}", scope.workspace(), scope.document()))
    );
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    if tabs.open_tabs.is_empty() {
        println!("  {}", dim.apply_to("No open tabs"));
    } else {
        for tab in &tabs.open_tabs {
            let active = tabs.active_tab_id.as_deref() == Some(tab.id.as_str());
            let marker = if active { "▸" } else { " " };
            let pin = if tab.pinned { " (pinned)" } else { "" };
            let name = if active {
                cyan.apply_to(&tab.id).to_string()
            } else {
                tab.id.clone()
            };
            println!("  {marker} {name}{}", dim.apply_to(pin));
        }
    }
    if !tabs.mru.is_empty() {
        println!();
        println!("  {} {}", dim.apply_to("Recent:"), tabs.mru.join(", "));
    }

    println!();
    println!(
        "  {} {} at {:.0}%",
        dim.apply_to("Console:"),
        console_state(console.state),
        console.fraction * 100.0
    );
    println!();
    Ok(())
}

fn clear(ctx: &Context, workspace: Option<&str>, document: Option<&str>) -> Result<()> {
    let scope = ctx.scope(workspace, document);
    let backend = ctx.backend();
    scope.tabs(backend.clone()).clear()?;
    scope.console(backend).clear()?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "cleared": true }));
    } else {
        println!(
            "Cleared session {}/{}",
            scope.workspace(),
            scope.document()
        );
    }
    Ok(())
}

fn console_state(state: ConsoleState) -> &'static str {
    match state {
        ConsoleState::Expanded => "expanded",
        ConsoleState::Collapsed => "collapsed",
        ConsoleState::Maximized => "maximized",
    }
}
