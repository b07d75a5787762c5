//! Prometheus metrics for listeners and the API transport
//!
//! Recording goes through the `metrics` facade and costs nothing until
//! [`init_metrics`] installs the Prometheus exporter. The exporter is installed
//! at most once per process.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Metric names
pub mod names {
    /// Resources handed to a handler, by `resource_type` and `outcome`
    pub const RESOURCES_PROCESSED: &str = "resources_processed_total";
    /// Listener drains ended by an error, by `resource_type` and `kind`
    pub const LISTENER_ERRORS: &str = "listener_errors_total";
    /// Wall time of one driver cycle
    pub const CYCLE_DURATION: &str = "poll_cycle_duration_seconds";
    /// Durable checkpoint writes, by `resource_type`
    pub const CHECKPOINT_WRITES: &str = "checkpoint_writes_total";
    /// API responses and network failures, by `endpoint` and `status`
    pub const HTTP_REQUESTS: &str = "http_requests_total";
    /// API request latency, by `endpoint`
    pub const HTTP_DURATION: &str = "http_request_duration_seconds";
    /// Retries scheduled after a failed attempt
    pub const HTTP_RETRIES: &str = "http_retries_total";
    /// Time slept before each retry
    pub const HTTP_BACKOFF: &str = "http_retry_backoff_seconds";
}

/// Address of the running exporter, set once
static EXPORTER_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Exporter could not bind or a recorder is already installed
    #[error("failed to install Prometheus exporter on {addr}: {reason}")]
    Install {
        /// Requested scrape address
        addr: SocketAddr,
        /// Underlying failure
        reason: String,
    },
}

/// Install the Prometheus exporter serving `/metrics` on `addr`
///
/// Must be called from within a Tokio runtime. Later calls are no-ops and keep
/// the first address.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    let bound = EXPORTER_ADDR.get_or_try_init(|| {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| MetricsError::Install {
                addr,
                reason: e.to_string(),
            })?;
        describe_all();
        info!(%addr, "Prometheus exporter listening");
        Ok(addr)
    })?;

    if *bound != addr {
        debug!(requested = %addr, active = %bound, "Metrics exporter already running");
    }
    Ok(())
}

/// Whether an exporter is installed
pub fn is_initialized() -> bool {
    EXPORTER_ADDR.get().is_some()
}

/// Address the exporter is serving on, if any
pub fn exporter_addr() -> Option<SocketAddr> {
    EXPORTER_ADDR.get().copied()
}

fn describe_all() {
    describe_counter!(
        names::RESOURCES_PROCESSED,
        Unit::Count,
        "Resources handed to a handler, labelled by outcome"
    );
    describe_counter!(
        names::LISTENER_ERRORS,
        Unit::Count,
        "Listener drains aborted by a transport or persistence error"
    );
    describe_histogram!(
        names::CYCLE_DURATION,
        Unit::Seconds,
        "Duration of one driver cycle over all listeners"
    );
    describe_counter!(
        names::CHECKPOINT_WRITES,
        Unit::Count,
        "Processing records durably written"
    );
    describe_counter!(
        names::HTTP_REQUESTS,
        Unit::Count,
        "API requests by endpoint and response status"
    );
    describe_histogram!(names::HTTP_DURATION, Unit::Seconds, "API request latency");
    describe_counter!(names::HTTP_RETRIES, Unit::Count, "API request retries");
    describe_histogram!(
        names::HTTP_BACKOFF,
        Unit::Seconds,
        "Delay before each API request retry"
    );
}

/// Times one API request attempt
///
/// Consumed by [`RequestTimer::finish`] or [`RequestTimer::network_error`] so an
/// attempt is counted exactly once.
#[derive(Debug)]
pub struct RequestTimer {
    endpoint: String,
    attempt: u32,
    started: Instant,
}

impl RequestTimer {
    /// Start timing attempt number `attempt` (1-based) against `endpoint`
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            attempt,
            started: Instant::now(),
        }
    }

    /// The attempt got a response
    pub fn finish(self, status: u16) {
        let elapsed = self.started.elapsed();
        counter!(names::HTTP_REQUESTS, "endpoint" => self.endpoint.clone(), "status" => status.to_string())
            .increment(1);
        histogram!(names::HTTP_DURATION, "endpoint" => self.endpoint.clone())
            .record(elapsed.as_secs_f64());
        debug!(
            endpoint = %self.endpoint,
            status,
            attempt = self.attempt,
            elapsed_ms = elapsed.as_millis(),
            "API response"
        );
    }

    /// The attempt failed before any response arrived
    pub fn network_error(self) {
        let elapsed = self.started.elapsed();
        counter!(names::HTTP_REQUESTS, "endpoint" => self.endpoint.clone(), "status" => "network_error")
            .increment(1);
        warn!(
            endpoint = %self.endpoint,
            attempt = self.attempt,
            elapsed_ms = elapsed.as_millis(),
            "API request failed without a response"
        );
    }
}

/// Count a retry and the delay slept before it
pub fn record_retry_backoff(delay: Duration, attempt: u32) {
    counter!(names::HTTP_RETRIES).increment(1);
    histogram!(names::HTTP_BACKOFF).record(delay.as_secs_f64());
    debug!(attempt, delay_ms = delay.as_millis(), "Backing off before retry");
}

/// Count one handled resource
pub fn record_resource_processed(resource_type: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::RESOURCES_PROCESSED, "resource_type" => resource_type.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Count a listener drain ended by an error
pub fn record_listener_error(resource_type: &str, kind: &'static str) {
    counter!(names::LISTENER_ERRORS, "resource_type" => resource_type.to_string(), "kind" => kind)
        .increment(1);
}

/// Count one durable checkpoint write
pub fn record_checkpoint_write(resource_type: &str) {
    counter!(names::CHECKPOINT_WRITES, "resource_type" => resource_type.to_string()).increment(1);
}

/// Observe the duration of a driver cycle
pub fn record_cycle_duration(duration: Duration) {
    histogram!(names::CYCLE_DURATION).record(duration.as_secs_f64());
}
