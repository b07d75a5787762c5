//! Listener state machine and driver loop
//!
//! # Overview
//!
//! A [`Listener`] ties a [`crate::source::ResourceSource`] to the checkpoint store and
//! a user [`Handler`]. Each [`Listener::poll_once`]:
//!
//! 1. Reads the checkpoint (or the lazily resolved default)
//! 2. Asks the source for the resource after it
//! 3. Hands it to the handler, catching errors and panics
//! 4. Records the outcome, success or not
//!
//! The [`Driver`] drains every listener once per cycle and sleeps between cycles.
//!
//! # Delivery
//!
//! At-most-once. A handler failure is recorded and never retried, so one broken
//! resource cannot block the ones after it. Handlers that want retries must do
//! them before returning.
//!
//! # Error Handling
//!
//! - Source errors end the current drain; nothing is recorded, so the next cycle
//!   retries from the same checkpoint
//! - Persistence errors are fatal and stop the driver

pub mod driver;
pub mod handler;
#[allow(clippy::module_inception)]
pub mod listener;

pub use driver::{CycleReport, Driver};
pub use handler::Handler;
pub use listener::{Listen, Listener};

use crate::checkpoint::CheckpointError;
use crate::source::SourceError;

/// Errors that end a listener drain
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Resource source failed (transport, auth, parse)
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Checkpoint could not be persisted
    #[error("persistence error: {0}")]
    Persistence(#[from] CheckpointError),
}

impl ListenerError {
    /// Whether the driver must stop instead of moving on
    pub fn is_fatal(&self) -> bool {
        matches!(self, ListenerError::Persistence(_))
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ListenerError::Source(SourceError::AuthExpired(_)) => "auth",
            ListenerError::Source(_) => "transport",
            ListenerError::Persistence(_) => "persistence",
        }
    }
}
