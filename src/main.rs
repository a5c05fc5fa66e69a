mod certbot;
mod cli;
mod compose;
mod config;
mod deploy;
mod docker;
mod envfile;
mod error;
mod host;
mod input;
mod nginx;
mod os;
mod output;
mod secrets;
mod stack;
mod ufw;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .without_time()
        .init();

    match cli.command {
        Command::Install { yes } => {
            let config = config::DeployerConfig::load_or_default(&cli.config)?;
            cli::install::run(config, yes).await?;
        }

        Command::Init => {
            cli::init::run(&cli.config)?;
        }

        Command::PatchCompose {
            file,
            port,
            dry_run,
        } => {
            cli::patch::run(&file, port, dry_run)?;
        }

        Command::RenderSite { domain, port } => {
            let config = config::DeployerConfig::load_or_default(&cli.config)?;
            cli::site::run(&config, &domain, port)?;
        }
    }

    Ok(())
}
