//! Build command - builds the workspace environment and streams its logs.

use anyhow::Result;
use clap::Args;
use workbench_activity::ActivityKind;
use workbench_stream::BuildRequest;

use super::Context;
use super::activity::follow;

/// Arguments for the build command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Rebuild even if the environment is current
    #[arg(short, long)]
    pub force: bool,

    /// Return once the build finishes instead of waiting for the environment
    /// to become active
    #[arg(long)]
    pub no_wait: bool,
}

impl BuildArgs {
    fn request(&self) -> BuildRequest {
        BuildRequest {
            force: self.force,
            wait: !self.no_wait,
        }
    }
}

/// Run the build command.
pub async fn run(args: BuildArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let coordinator = ctx.coordinator(&client);
    let request = args.request();
    follow(ctx, &coordinator, ActivityKind::Build, |c| c.start_build(request)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_waits_by_default() {
        let args = BuildArgs {
            force: false,
            no_wait: false,
        };
        assert_eq!(
            args.request(),
            BuildRequest {
                force: false,
                wait: true
            }
        );
    }

    #[test]
    fn test_request_force_no_wait() {
        let args = BuildArgs {
            force: true,
            no_wait: true,
        };
        assert_eq!(
            args.request(),
            BuildRequest {
                force: true,
                wait: false
            }
        );
    }
}
