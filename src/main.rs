//! netsec - training pipeline entry point

use clap::Parser;
use netsec_pipeline::cli::{cmd_config, cmd_ingest, cmd_run, cmd_validate, Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netsec_pipeline=info,netsec=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, no_sync } => cmd_run(config.as_deref(), no_sync)?,
        Commands::Ingest { config } => cmd_ingest(config.as_deref())?,
        Commands::Validate { config } => cmd_validate(config.as_deref())?,
        Commands::Config { config } => cmd_config(config.as_deref())?,
    }

    Ok(())
}
