//! Validate command - checks the workspace configuration.

use anyhow::Result;
use clap::Args;
use workbench_activity::ActivityKind;
use workbench_stream::ValidationRequest;

use super::Context;
use super::activity::follow;

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Validate the configuration at this digest instead of the current one
    #[arg(long)]
    pub digest: Option<String>,
}

/// Run the validate command.
///
/// Validation problems are reported as issues and end the activity as
/// failed, which makes the process exit non-zero.
pub async fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let coordinator = ctx.coordinator(&client);
    let request = ValidationRequest {
        digest: args.digest,
    };
    follow(ctx, &coordinator, ActivityKind::Validation, |c| {
        c.start_validation(request)
    })
    .await?;
    Ok(())
}
