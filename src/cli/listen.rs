//! Listen command: wire sources, listeners and the driver together

use super::{Cli, CliError, OutputFormat};
use crate::checkpoint::CheckpointStore;
use crate::key::{KeyKind, ResourceKey};
use crate::listener::driver::DEFAULT_INTERVAL_SECS;
use crate::listener::{Driver, Listener};
use crate::metrics;
use crate::shutdown::SharedShutdown;
use crate::source::{ApiClient, OrderSource, QuoteSource};
use crate::{Order, Quote};
use clap::Parser;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Arguments for the listen command
#[derive(Parser, Debug)]
pub struct ListenArgs {
    /// Seconds to sleep between polling cycles
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,

    /// Listen for new orders (default)
    #[arg(long, overrides_with = "no_orders")]
    pub orders: bool,

    /// Do not listen for orders
    #[arg(long = "no-orders", overrides_with = "orders")]
    pub no_orders: bool,

    /// Listen for new quotes and quote revisions
    #[arg(long, default_value_t = false)]
    pub quotes: bool,

    /// Start after this order number when there is no checkpoint yet
    #[arg(long)]
    pub order_start: Option<u64>,

    /// Extra order numbers to probe past a missing one
    #[arg(long, default_value_t = 0)]
    pub order_lookahead: u64,

    /// Start after this quote (`number` or `number:revision`) when there is no checkpoint yet
    #[arg(long)]
    pub quote_start: Option<String>,

    /// Serve Prometheus metrics on this address, e.g. 127.0.0.1:9090
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl ListenArgs {
    /// Whether the order listener is enabled
    pub fn listen_orders(&self) -> bool {
        !self.no_orders
    }

    /// Execute the listen command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        if !self.listen_orders() && !self.quotes {
            return Err(CliError::InvalidArgument(
                "nothing to listen for; enable --orders or --quotes".to_string(),
            ));
        }

        let quote_start = self
            .quote_start
            .as_deref()
            .map(|s| ResourceKey::parse(s, KeyKind::Revisioned))
            .transpose()?;

        if let Some(addr) = self.metrics_addr {
            metrics::init_metrics(addr)?;
        }

        let client = Arc::new(ApiClient::new(cli.api_config()?)?);
        let store = CheckpointStore::open_shared(&cli.checkpoint_file)?;
        let output_format = cli.output_format;

        let mut driver = Driver::new(Duration::from_secs(self.interval))
            .run_once(self.once)
            .with_shutdown(shutdown);

        if self.listen_orders() {
            let source = OrderSource::new(client.clone()).with_lookahead(self.order_lookahead);
            let mut listener = Listener::new(source, store.clone(), move |order: &Order| {
                if let Err(e) = order.validate() {
                    warn!(number = order.number, error = %e, "Order failed validation");
                }
                emit("order", order, output_format)
            });
            if let Some(start) = self.order_start {
                listener = listener.with_default_key(ResourceKey::Number(start));
            }
            driver.add_listener(listener);
        }

        if self.quotes {
            let mut listener = Listener::new(QuoteSource::new(client), store, move |quote: &Quote| {
                if let Err(e) = quote.validate() {
                    warn!(number = quote.number, error = %e, "Quote failed validation");
                }
                emit("quote", quote, output_format)
            });
            if let Some(start) = quote_start {
                listener = listener.with_default_key(start);
            }
            driver.add_listener(listener);
        }

        info!(
            checkpoint_file = %cli.checkpoint_file.display(),
            listeners = driver.len(),
            "Starting listeners"
        );
        driver.run().await?;
        Ok(())
    }
}

/// One line of `--output-format json` output
#[derive(Serialize)]
struct Event<'a, T> {
    #[serde(rename = "type")]
    kind: &'a str,
    resource: &'a T,
}

/// Print one new resource to stdout
fn emit<T: Serialize>(kind: &str, resource: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&Event { kind, resource })?);
        }
        OutputFormat::Human => {
            println!("new {kind}: {}", serde_json::to_string(resource)?);
        }
    }
    Ok(())
}
