//! Subcommand implementations

pub mod create;
pub mod downgrade;
pub mod history;
pub mod init;
pub mod upgrade;

use colored::Colorize;

use docshift_core::{ApplyReport, Direction};

use crate::cli::Commands;
use crate::context::CommandContext;
use crate::error::CommandError;

/// Run one subcommand and return what should be printed on stdout
pub async fn execute(ctx: &CommandContext, command: &Commands) -> Result<String, CommandError> {
    match command {
        Commands::Init => {
            let outcome = init::run(ctx).await?;
            Ok(outcome.to_string())
        }
        Commands::Create { title } => {
            let path = create::run(ctx, title).await?;
            Ok(format!("{} Created migration {}", "[+]".green(), path.display()))
        }
        Commands::Upgrade(args) => {
            let report = upgrade::run(ctx, args.target()).await?;
            Ok(describe_report(&report))
        }
        Commands::Downgrade(args) => {
            let report = downgrade::run(ctx, args.target()).await?;
            Ok(describe_report(&report))
        }
        Commands::History => history::run(ctx).await,
    }
}

/// One-line summary of an upgrade or downgrade
pub fn describe_report(report: &ApplyReport) -> String {
    let verb = match report.direction {
        Direction::Upgrade => "upgrade",
        Direction::Downgrade => "downgrade",
    };
    if report.is_noop() {
        return format!("{} Nothing to {}", "[+]".green(), verb);
    }
    format!(
        "{} Applied {} {}(s): {} -> {} in {}ms",
        "[+]".green(),
        report.applied.len(),
        verb,
        report.from_version.as_deref().unwrap_or("None"),
        report.to_version.as_deref().unwrap_or("None"),
        report.duration_ms
    )
}
