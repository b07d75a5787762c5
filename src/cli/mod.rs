//! CLI command implementations

pub mod error;
pub mod listen;
pub mod status;

pub use error::CliError;
pub use listen::ListenArgs;
pub use status::{ResetArgs, StatusArgs};

use crate::source::config::{DEFAULT_TIMEOUT_SECS, MAX_RETRIES};
use crate::source::ApiConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default checkpoint file, relative to the working directory
pub const DEFAULT_CHECKPOINT_FILE: &str = "checkpoints.json";

/// Order desk listener CLI
#[derive(Parser, Debug)]
#[command(name = "order-desk")]
#[command(about = "Listen for new orders and quotes in an order desk API", long_about = None)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// API base URL, e.g. https://orders.example.com/api
    #[arg(long, global = true, env = "ORDER_DESK_URL")]
    pub base_url: Option<String>,

    /// API username
    #[arg(long, global = true, env = "ORDER_DESK_USER")]
    pub username: Option<String>,

    /// API password
    #[arg(long, global = true, env = "ORDER_DESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Checkpoint file recording processed resources
    #[arg(long, global = true, default_value = DEFAULT_CHECKPOINT_FILE)]
    pub checkpoint_file: PathBuf,

    /// Maximum number of retries for failed requests (range: 0-20)
    #[arg(long, global = true, default_value_t = MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// Build the API connection settings from the global flags
    pub fn api_config(&self) -> Result<ApiConfig, CliError> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            CliError::ConfigurationError(
                "no API base URL; pass --base-url or set ORDER_DESK_URL".to_string(),
            )
        })?;

        let mut config = ApiConfig::new(base_url)
            .with_max_retries(self.max_retries)
            .with_timeout(Duration::from_secs(self.timeout_secs));

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                config = config.with_credentials(username, password);
            }
            (None, None) => {}
            _ => {
                return Err(CliError::ConfigurationError(
                    "--username and --password must be given together".to_string(),
                ))
            }
        }

        Ok(config)
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the API and handle every newly created resource once
    Listen(ListenArgs),

    /// Show the checkpoint and record counts per resource type
    Status(StatusArgs),

    /// Clear processing records so listening starts over
    Reset(ResetArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}
