//! buildhook CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "buildhook")]
#[command(about = "buildhook operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a deployment configuration
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "deploy.yml")]
        path: PathBuf,
    },
    /// Print the signature header for a webhook payload
    Sign {
        /// Webhook secret
        #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
        /// Payload file
        file: PathBuf,
    },
    /// Run one build job in the foreground
    Run(commands::run::RunArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::Sign { secret, file } => {
            commands::sign(&secret, &file)?;
        }
        Commands::Run(args) => {
            commands::run::run(args).await?;
        }
    }

    Ok(())
}
