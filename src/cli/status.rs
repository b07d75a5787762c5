//! Status and reset commands over the checkpoint file

use super::{Cli, CliError, OutputFormat};
use crate::checkpoint::{CheckpointStore, StoreSummary};
use crate::key::ResourceType;
use clap::Parser;
use tracing::info;

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Only show this resource type
    #[arg(long)]
    pub resource_type: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        // Snapshot without the lock so status works while `listen` owns the file
        let store = CheckpointStore::open_read_only(&cli.checkpoint_file)?;

        let types = match &self.resource_type {
            Some(name) => vec![ResourceType::parse(name)?],
            None => store
                .resource_types()
                .iter()
                .map(|name| ResourceType::parse(name))
                .collect::<Result<Vec<_>, _>>()?,
        };
        let summaries: Vec<StoreSummary> = types.iter().map(|ty| store.summary(ty)).collect();

        match cli.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&summaries).map_err(|e| {
                    CliError::InvalidArgument(format!("Failed to serialize status: {e}"))
                })?;
                println!("{json}");
            }
            OutputFormat::Human => {
                println!("Checkpoint file: {}", cli.checkpoint_file.display());
                if summaries.is_empty() {
                    println!("No resources processed yet");
                }
                for summary in &summaries {
                    print_summary(summary);
                }
            }
        }
        Ok(())
    }
}

fn print_summary(summary: &StoreSummary) {
    let checkpoint = summary
        .last_processed
        .map(|key| key.to_string())
        .unwrap_or_else(|| "-".to_string());
    let at = summary
        .last_processed_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<12} checkpoint={:<10} processed={} succeeded={} failed={} at={}",
        summary.resource_type, checkpoint, summary.total, summary.succeeded, summary.failed, at
    );
}

/// Arguments for the reset command
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Only clear this resource type (all types when omitted)
    #[arg(long)]
    pub resource_type: Option<String>,

    /// Confirm the reset
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

impl ResetArgs {
    /// Execute the reset command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let resource_type = self
            .resource_type
            .as_deref()
            .map(ResourceType::parse)
            .transpose()?;
        let scope = resource_type
            .as_ref()
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| "all resource types".to_string());

        if !self.yes {
            return Err(CliError::InvalidArgument(format!(
                "refusing to clear {scope} in {} without --yes",
                cli.checkpoint_file.display()
            )));
        }

        let mut store = CheckpointStore::open(&cli.checkpoint_file)?;
        store.clear(resource_type.as_ref())?;
        info!(scope = %scope, "Checkpoint records cleared");

        if cli.output_format == OutputFormat::Human {
            println!("Cleared {scope}; the next listen starts from its default");
        }
        Ok(())
    }
}
