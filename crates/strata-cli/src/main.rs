mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error(&format!("{e:#}"));
            std::process::exit(1);
        }
    }
}

/// Run the selected command. `Ok(false)` means the command completed but
/// the answer was a denial.
async fn run() -> Result<bool> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);

    let config = config::load(cli.config.as_deref())?;
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Validate(args) => commands::validate::validate(args, &config, format).await?,
        Commands::Check(args) => return commands::check::check(args, &config, format).await,
        Commands::Visible(args) => commands::visible::visible(args, &config, format).await?,
        Commands::Privileges(args) => {
            commands::privileges::privileges(args, &config, format).await?;
        }
        Commands::Watch(args) => commands::watch::watch(args, &config).await?,
    }

    Ok(true)
}
