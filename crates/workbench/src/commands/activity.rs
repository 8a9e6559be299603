//! Following a coordinator activity to completion on the terminal.

use anyhow::{Result, bail};
use console::Style;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};
use workbench_activity::{
    Activity, ActivityId, ActivityKind, ActivityStatus, Issue, IssueLevel, LogLevel, LogLine,
    OutputLink, RunOutput,
};
use workbench_stream::{CoordinatorEvent, Notice, StartOutcome, StreamCoordinator};

use super::Context;

/// Start an activity, stream its progress, and return its final record.
///
/// Ctrl-C cancels the activity and waits for it to settle as `canceled`.
/// A failed activity becomes an error so the process exits non-zero.
pub async fn follow(
    ctx: &Context,
    coordinator: &StreamCoordinator,
    kind: ActivityKind,
    start: impl FnOnce(&StreamCoordinator) -> StartOutcome,
) -> Result<Activity> {
    // Subscribe first so the opening lines are not missed.
    let mut feed = coordinator.subscribe();
    let id = match start(coordinator) {
        StartOutcome::Started(id) => id,
        StartOutcome::Rejected(reason) => bail!("Cannot start {kind}: {reason}"),
    };
    debug!(activity_id = %id, kind = %kind, "Following activity");

    let printer = Printer::new(ctx.json_output);
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                printer.interrupted(kind);
                coordinator.cancel(kind);
            }
            event = feed.recv() => match event {
                Ok(event) => {
                    if printer.event(id, &event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Console fell behind the activity feed");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    coordinator.join(kind).await;
    loop {
        match feed.try_recv() {
            Ok(event) => {
                printer.event(id, &event);
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    let Some(activity) = coordinator.activity(id) else {
        bail!("{kind} activity {id} disappeared");
    };
    printer.finish(&activity)?;

    if activity.status() == ActivityStatus::Failed {
        bail!(
            "{} failed: {}",
            activity.label,
            activity.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(activity)
}

// ─────────────────────────────────────────────────────────────────────────────
// Printer
// ─────────────────────────────────────────────────────────────────────────────

struct Printer {
    json: bool,
    dim: Style,
    yellow: Style,
    red: Style,
    green: Style,
}

impl Printer {
    fn new(json: bool) -> Self {
        Self {
            json,
            dim: Style::new().dim(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            green: Style::new().green(),
        }
    }

    /// Print one feed event. Returns true once `id` has completed.
    fn event(&self, id: ActivityId, event: &CoordinatorEvent) -> bool {
        match event {
            CoordinatorEvent::Notice(notice) => {
                self.notice(notice);
                false
            }
            CoordinatorEvent::Completed { id: done, .. } => *done == id,
            _ if self.json => false,
            CoordinatorEvent::Started { id: started, label, .. } if *started == id => {
                println!("{}", Style::new().bold().apply_to(label));
                false
            }
            CoordinatorEvent::Log { id: source, line } if *source == id => {
                self.log(line);
                false
            }
            CoordinatorEvent::Issues { id: source, issues } if *source == id => {
                issues.iter().for_each(|issue| self.issue(issue));
                false
            }
            CoordinatorEvent::Outputs { id: source, outputs, links } if *source == id => {
                self.outputs(outputs, links);
                false
            }
            _ => false,
        }
    }

    fn log(&self, line: &LogLine) {
        let prefix = line.level.prefix();
        match line.level {
            LogLevel::Debug => println!("{}", self.dim.apply_to(format!("{prefix} {}", line.message))),
            LogLevel::Info => println!("{} {}", self.dim.apply_to(prefix), line.message),
            LogLevel::Warning => println!("{}", self.yellow.apply_to(format!("{prefix} {}", line.message))),
            LogLevel::Error => println!("{}", self.red.apply_to(format!("{prefix} {}", line.message))),
        }
    }

    fn issue(&self, issue: &Issue) {
        let (marker, style) = match issue.level {
            IssueLevel::Error => ("error", &self.red),
            IssueLevel::Warning => ("warning", &self.yellow),
            IssueLevel::Info => ("info", &self.dim),
        };
        match &issue.path {
            Some(path) => println!(
                "  {} {} {}",
                style.apply_to(marker),
                self.dim.apply_to(path),
                issue.message
            ),
            None => println!("  {} {}", style.apply_to(marker), issue.message),
        }
    }

    fn outputs(&self, outputs: &[RunOutput], links: &[OutputLink]) {
        if outputs.is_empty() {
            return;
        }
        println!();
        println!("{}", self.dim.apply_to("Outputs:"));
        for output in outputs {
            let href = links
                .iter()
                .find(|link| link.label == output.path)
                .map(|link| link.href.as_str());
            match href {
                Some(href) => println!("  {}  {}", output.path, self.dim.apply_to(href)),
                None => println!("  {}", output.path),
            }
        }
    }

    fn notice(&self, notice: &Notice) {
        eprintln!("{} {}", self.red.apply_to("!"), self.red.apply_to(&notice.message));
    }

    fn interrupted(&self, kind: ActivityKind) {
        if !self.json {
            eprintln!("{}", self.yellow.apply_to(format!("Canceling {kind}...")));
        }
    }

    fn finish(&self, activity: &Activity) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(activity)?);
            return Ok(());
        }

        let status = activity.status();
        let style = match status {
            ActivityStatus::Succeeded => &self.green,
            ActivityStatus::Failed => &self.red,
            _ => &self.yellow,
        };
        let mut line = format!("{} {}", style.apply_to("●"), style.apply_to(status));
        if let Some(summary) = &activity.summary {
            line.push_str(&format!(" ({summary})"));
        }
        if let Some(duration) = activity.duration() {
            let millis = duration.num_milliseconds().max(0);
            line.push_str(&format!(
                " {}",
                self.dim.apply_to(format!("in {}.{:03}s", millis / 1000, millis % 1000))
            ));
        }
        println!();
        println!("{line}");

        // A successful activity can still carry a remote error message.
        if status == ActivityStatus::Succeeded
            && let Some(message) = &activity.error_message
        {
            println!("  {} {}", self.yellow.apply_to("warning"), message);
        }
        Ok(())
    }
}
