//! Driver: runs every listener to exhaustion on a fixed interval

use super::listener::Listen;
use super::ListenerError;
use crate::key::ResourceType;
use crate::metrics;
use crate::shutdown::SharedShutdown;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Default seconds between cycles
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Outcome of one cycle over all listeners
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Resources processed per listener that drained cleanly
    pub processed: Vec<(ResourceType, u64)>,
    /// Listeners whose drain ended in a non-fatal error
    pub failed: Vec<(ResourceType, String)>,
}

impl CycleReport {
    /// Resources processed across all listeners
    pub fn total_processed(&self) -> u64 {
        self.processed.iter().map(|(_, count)| count).sum()
    }
}

/// Owns the listeners and the polling loop
///
/// Listeners run one after another; a failing listener is logged and skipped so
/// the others still run. Only persistence errors stop the driver.
pub struct Driver {
    listeners: Vec<Box<dyn Listen>>,
    interval: Duration,
    run_once: bool,
    shutdown: Option<SharedShutdown>,
}

impl Driver {
    /// Create a driver sleeping `interval` between cycles
    pub fn new(interval: Duration) -> Self {
        Self {
            listeners: Vec::new(),
            interval,
            run_once: false,
            shutdown: None,
        }
    }

    /// Run a single cycle and return instead of looping forever
    pub fn run_once(mut self, run_once: bool) -> Self {
        self.run_once = run_once;
        self
    }

    /// Attach a shared shutdown handle for graceful stop between cycles.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Register a listener; listeners run in registration order
    pub fn add_listener(&mut self, listener: impl Listen + 'static) {
        info!(resource_type = %listener.resource_type(), "Registered listener");
        self.listeners.push(Box::new(listener));
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listeners are registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|shutdown| shutdown.is_shutdown_requested())
    }

    /// Drain every listener once
    ///
    /// # Errors
    /// Only fatal (persistence) errors are returned; everything else ends up in
    /// [`CycleReport::failed`].
    pub async fn run_cycle(&mut self) -> Result<CycleReport, ListenerError> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        for index in 0..self.listeners.len() {
            if self.shutdown_requested() {
                info!("Shutdown requested, skipping remaining listeners");
                break;
            }

            let listener = &mut self.listeners[index];
            let resource_type = listener.resource_type().clone();
            debug!(resource_type = %resource_type, "Draining listener");

            match listener.listen().await {
                Ok(count) => {
                    if count > 0 {
                        info!(resource_type = %resource_type, processed = count, "Listener caught up");
                    }
                    report.processed.push((resource_type, count));
                }
                Err(e) => {
                    metrics::record_listener_error(resource_type.as_str(), e.kind());
                    if e.is_fatal() {
                        error!(resource_type = %resource_type, error = %e, "Fatal listener error, stopping");
                        return Err(e);
                    }
                    error!(
                        resource_type = %resource_type,
                        kind = e.kind(),
                        error = %e,
                        "Listener failed, retrying next cycle"
                    );
                    report.failed.push((resource_type, e.to_string()));
                }
            }
        }

        metrics::record_cycle_duration(started.elapsed());
        Ok(report)
    }

    /// Run cycles until `run_once` completes, shutdown is requested or a fatal error occurs
    pub async fn run(&mut self) -> Result<(), ListenerError> {
        info!(
            listeners = self.listeners.len(),
            interval_secs = self.interval.as_secs(),
            run_once = self.run_once,
            "Driver started"
        );

        loop {
            let report = self.run_cycle().await?;
            debug!(
                processed = report.total_processed(),
                failed = report.failed.len(),
                "Cycle finished"
            );

            if self.run_once || self.shutdown_requested() {
                break;
            }

            let slept = match &self.shutdown {
                Some(shutdown) => shutdown.sleep(self.interval).await,
                None => {
                    tokio::time::sleep(self.interval).await;
                    true
                }
            };
            if !slept {
                break;
            }
        }

        info!("Driver stopped");
        Ok(())
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_INTERVAL_SECS))
    }
}
