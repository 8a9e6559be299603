//! Extract command - runs an extraction for one document.

use anyhow::Result;
use clap::Args;
use workbench_activity::ActivityKind;
use workbench_stream::ExtractionRequest;

use super::Context;
use super::activity::follow;

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Document to extract from
    #[arg(short, long)]
    pub document: String,

    /// Only extract these sheets (repeatable)
    #[arg(short, long = "sheet", value_name = "NAME")]
    pub sheets: Vec<String>,
}

/// Run the extract command.
pub async fn run(args: ExtractArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let coordinator = ctx.coordinator(&client);
    let request = ExtractionRequest::new(args.document).with_sheets(args.sheets);
    follow(ctx, &coordinator, ActivityKind::Extraction, |c| {
        c.start_extraction(request)
    })
    .await?;
    Ok(())
}
