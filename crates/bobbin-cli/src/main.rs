//! `bobbin` - single-node task distribution over a local data directory.
//!
//! # Usage
//!
//! ```bash
//! # Run the reaper and lease sweeper until Ctrl-C
//! bobbin serve --data-dir ./database
//!
//! # Producer / worker operations (JSON on stdout)
//! bobbin create --name resize --payload "img-42" --meta team=media
//! bobbin unleased
//! bobbin lease task-01J... --owner worker-1
//! bobbin extend lease-01J... --owner worker-1 --seconds 300
//! bobbin complete task-01J...
//! ```
//!
//! Logs go to stderr. `RUST_LOG` overrides `--log-level`.

mod bootstrap;
mod commands;
mod config;
mod error;

use bobbin_core::App;
use bobbin_core::app::AppBuilder;
use clap::Parser;

use crate::commands::Command;
use crate::config::{CliArgs, CliConfig};
use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(version, about = "Single-node task distribution with leases")]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CliConfig::load(&cli.args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(config, cli.command).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(config: CliConfig, command: Command) -> Result<(), CliError> {
    bootstrap::ensure_data_dirs(&config.core)?;
    let app = AppBuilder::new(config.core).build().await?;

    match command {
        Command::Serve => serve(app).await,
        command => {
            let output = commands::execute(&app, command).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

async fn serve(app: App) -> Result<(), CliError> {
    tracing::info!(
        data_dir = %app.config.data_dir().display(),
        reap_interval_secs = app.config.reap_interval.as_secs(),
        retention_secs = app.config.retention.as_secs(),
        lease_sweep_interval_secs = app.config.lease_sweep_interval.as_secs(),
        "bobbin serving"
    );
    let background = app.spawn_background();

    let signal = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
    background.shutdown_and_join().await;
    signal.map_err(CliError::Signal)
}
