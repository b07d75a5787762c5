//! # Order Desk Client Library
//!
//! Client library for an order/quote-management web API, built around a polling
//! listener that detects newly created resources and hands each one to a handler
//! exactly once.
//!
//! ## Features
//!
//! - **Typed models**: orders, quotes, customers and components mapped from wire JSON
//! - **Transport**: authenticated HTTP client with retry and CRUD wrappers
//! - **Listeners**: checkpointed polling with at-most-once delivery
//! - **Durable checkpoints**: atomic, fsync'd JSON checkpoint file
//!
//! ## Quick Start
//!
//! ```no_run
//! use order_desk_client::checkpoint::CheckpointStore;
//! use order_desk_client::listener::{Driver, Listener};
//! use order_desk_client::source::{ApiClient, ApiConfig, OrderSource};
//! use order_desk_client::Order;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(ApiClient::new(ApiConfig::new("https://orders.example.com/api"))?);
//! let store = CheckpointStore::open_shared("./checkpoints.json")?;
//!
//! let listener = Listener::new(OrderSource::new(client), store, |order: &Order| -> anyhow::Result<()> {
//!     println!("new order {}", order.number);
//!     Ok(())
//! });
//!
//! let mut driver = Driver::new(Duration::from_secs(60)).run_once(true);
//! driver.add_listener(listener);
//! driver.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`key`] - Resource types and keys
//! - [`checkpoint`] - Durable record of processed resources
//! - [`source`] - Resource sources, API transport and wire mapping
//! - [`listener`] - Listener state machine and the driver loop
//! - [`metrics`] - Prometheus metrics
//! - [`shutdown`] - Graceful shutdown coordination

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Durable checkpoint store
pub mod checkpoint;

/// CLI command implementations
pub mod cli;

/// Resource types and keys
pub mod key;

/// Listener state machine and driver
pub mod listener;

/// Production observability metrics
pub mod metrics;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Resource sources and API transport
pub mod source;

pub use key::{KeyKind, Keyed, ResourceKey, ResourceType};

/// Customer record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Customer ID
    pub id: u64,
    /// Display name
    pub name: String,
    /// Contact email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Company name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl Keyed for Customer {
    fn unique_identifier(&self) -> ResourceKey {
        ResourceKey::Number(self.id)
    }
}

/// Line item of an order or quote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component ID
    pub id: u64,
    /// Stock keeping unit
    pub sku: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered quantity
    pub quantity: u32,
    /// Price per unit
    pub unit_price: Decimal,
}

impl Component {
    /// Quantity times unit price
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }

    /// Validate component data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.sku.trim().is_empty() {
            return Err(format!("Component {} has an empty SKU", self.id));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(format!(
                "Component {} has a negative unit price: {}",
                self.id, self.unit_price
            ));
        }
        Ok(())
    }
}

impl Keyed for Component {
    fn unique_identifier(&self) -> ResourceKey {
        ResourceKey::Number(self.id)
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, not yet confirmed
    Pending,
    /// Confirmed by the vendor
    Confirmed,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled before delivery
    Cancelled,
    /// Status added to the API after this client was built
    #[serde(other)]
    Unknown,
}

/// Quote lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    /// Being edited
    Draft,
    /// Sent to the customer
    Sent,
    /// Accepted by the customer
    Accepted,
    /// Declined by the customer
    Declined,
    /// Past its expiry date
    Expired,
    /// Status added to the API after this client was built
    #[serde(other)]
    Unknown,
}

/// Sum of line totals, `None` when there are no components
fn components_total(components: &[Component]) -> Option<Decimal> {
    if components.is_empty() {
        return None;
    }
    Some(components.iter().map(Component::line_total).sum())
}

/// Order placed through the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order number, assigned by the API in creation order
    pub number: u64,
    /// Ordering customer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    /// Current status
    pub status: OrderStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Line items
    #[serde(default)]
    pub components: Vec<Component>,
    /// Order total
    pub total: Decimal,
}

impl Order {
    /// Validate order data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.number == 0 {
            return Err("Order number must be positive".to_string());
        }

        for component in &self.components {
            component.validate()?;
        }

        if let Some(expected) = components_total(&self.components) {
            if expected != self.total {
                return Err(format!(
                    "Order {} total ({}) does not match its components ({})",
                    self.number, self.total, expected
                ));
            }
        }

        Ok(())
    }
}

impl Keyed for Order {
    fn unique_identifier(&self) -> ResourceKey {
        ResourceKey::Number(self.number)
    }
}

/// Quote, possibly one revision of a quote number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Quote number
    pub number: u64,
    /// Revision, absent for the original quote
    #[serde(default)]
    pub revision: Option<u32>,
    /// Customer the quote was made for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    /// Current status
    pub status: QuoteStatus,
    /// Creation time of this revision
    pub created_at: DateTime<Utc>,
    /// Expiry time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Line items
    #[serde(default)]
    pub components: Vec<Component>,
    /// Quoted total
    pub total: Decimal,
}

impl Quote {
    /// Validate quote data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.number == 0 {
            return Err("Quote number must be positive".to_string());
        }

        if let Some(expires_at) = self.expires_at {
            if expires_at < self.created_at {
                return Err(format!(
                    "Quote {} expires ({}) before it was created ({})",
                    self.number, expires_at, self.created_at
                ));
            }
        }

        for component in &self.components {
            component.validate()?;
        }

        if let Some(expected) = components_total(&self.components) {
            if expected != self.total {
                return Err(format!(
                    "Quote {} total ({}) does not match its components ({})",
                    self.number, self.total, expected
                ));
            }
        }

        Ok(())
    }
}

impl Keyed for Quote {
    fn unique_identifier(&self) -> ResourceKey {
        ResourceKey::Revision(self.number, self.revision)
    }
}
