//! Save command - uploads a local file over a workspace file.
//!
//! Goes through the same tab session the editor uses, so the write is
//! guarded by the version that was loaded and a concurrent change on the
//! server is reported instead of overwritten.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::Style;
use serde::Serialize;
use tracing::info;
use workbench_files::{FileContent, FileSessionStore, SaveOutcome, SaveRequest, TabStatus};

use super::Context;

/// Arguments for the save command.
#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Workspace path to write
    pub path: String,

    /// Local file holding the new content
    #[arg(long, value_name = "FILE")]
    pub from: PathBuf,

    /// Create the file (and missing parent directories) instead of updating it
    #[arg(long)]
    pub create: bool,
}

/// Save result for JSON output.
#[derive(Debug, Serialize)]
struct SaveOutput {
    path: String,
    outcome: &'static str,
    etag: Option<String>,
}

/// Run the save command.
pub async fn run(args: SaveArgs, ctx: &Context) -> Result<()> {
    let content = tokio::fs::read_to_string(&args.from)
        .await
        .with_context(|| format!("failed to read {}", args.from.display()))?;
    let client = ctx.client()?;

    let output = if args.create {
        let receipt = client
            .save_file(SaveRequest::create(&args.path, content))
            .await?;
        SaveOutput {
            path: args.path,
            outcome: "created",
            etag: receipt.etag,
        }
    } else {
        update(client, args.path, content).await?
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let green = Style::new().green();
        let dim = Style::new().dim();
        let mut line = format!("{} {} {}", green.apply_to("●"), output.outcome, output.path);
        if let Some(etag) = &output.etag {
            line.push_str(&format!(" {}", dim.apply_to(format!("(etag {etag})"))));
        }
        println!("{line}");
    }
    Ok(())
}

async fn update(client: Arc<dyn FileContent>, path: String, content: String) -> Result<SaveOutput> {
    let store = FileSessionStore::new(client);
    store.open_file(&path);
    store.wait_for_loads().await;

    let Some(tab) = store.tab(&path) else {
        bail!("{path} could not be opened");
    };
    if tab.status == TabStatus::Error {
        bail!(
            "failed to load {path}: {}",
            tab.load_error.as_deref().unwrap_or("unknown error")
        );
    }

    store.update_content(&path, content);
    let outcome = match store.save_tab(&path).await? {
        SaveOutcome::Saved => "saved",
        SaveOutcome::Unchanged => "unchanged",
        SaveOutcome::Reloaded => {
            bail!("{path} changed on the server while saving; nothing was written")
        }
    };
    info!(path = %path, outcome, "File saved");

    let etag = store.tab(&path).and_then(|tab| tab.etag);
    Ok(SaveOutput {
        path,
        outcome,
        etag,
    })
}
