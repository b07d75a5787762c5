//! Main entry point for the order-desk CLI

use clap::Parser;
use order_desk_client::cli::{Cli, Commands};
use order_desk_client::shutdown::{self, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
///
/// Logs go to stderr so stdout carries only command output.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("order_desk_client=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Listen(args) => {
            let shutdown = ShutdownCoordinator::shared();
            shutdown::install_ctrl_c_handler(shutdown.clone());
            args.execute(&cli, shutdown).await
        }
        Commands::Status(args) => args.execute(&cli),
        Commands::Reset(args) => args.execute(&cli),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
