//! CLI error types and conversions

use crate::checkpoint::CheckpointError;
use crate::key::KeyError;
use crate::listener::ListenerError;
use crate::metrics::MetricsError;
use crate::source::SourceError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Key or resource type error
    #[error("key error: {0}")]
    KeyError(#[from] KeyError),

    /// Checkpoint store error
    #[error("checkpoint error: {0}")]
    CheckpointError(#[from] CheckpointError),

    /// Transport error
    #[error("source error: {0}")]
    SourceError(#[from] SourceError),

    /// Fatal listener error
    #[error("listener error: {0}")]
    ListenerError(#[from] ListenerError),

    /// Metrics exporter error
    #[error("metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
