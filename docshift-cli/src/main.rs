use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::Colorize;

use docshift_cli::commands;
use docshift_cli::{Cli, CommandContext};
use docshift_config::ConfigLoader;
use docshift_logging::init_logging;
use docshift_storage::MongoConnector;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(command) = cli.command.as_ref() else {
        // No subcommand: show usage and fail
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::FAILURE;
    };

    match run(&cli, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "[-]".red(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, command: &docshift_cli::Commands) -> Result<()> {
    let config = ConfigLoader::new().load(cli.config.as_ref())?;

    init_logging(&config.logging, cli.log_level.as_deref())?;
    tracing::debug!("Target database: {}", config.database.display_target());

    let ctx = CommandContext::new(config, Arc::new(MongoConnector));
    let output = commands::execute(&ctx, command).await?;
    println!("{}", output);
    Ok(())
}
