//! Endpoint registry for API resource types

use crate::key::{Keyed, ResourceKey};
use crate::{Component, Customer, Order, Quote};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A model that lives in an API collection
pub trait ApiResource: Keyed + Serialize + DeserializeOwned + Send + Sync {
    /// Type name used for logging and checkpoints
    const TYPE_NAME: &'static str;

    /// Collection path relative to the base URL
    const COLLECTION_PATH: &'static str;

    /// Path of a single member
    fn member_path(key: &ResourceKey) -> String {
        format!("{}/{}", Self::COLLECTION_PATH, key.number())
    }
}

impl ApiResource for Order {
    const TYPE_NAME: &'static str = "Order";
    const COLLECTION_PATH: &'static str = "/orders";
}

impl ApiResource for Quote {
    const TYPE_NAME: &'static str = "Quote";
    const COLLECTION_PATH: &'static str = "/quotes";

    fn member_path(key: &ResourceKey) -> String {
        match key.revision() {
            Some(revision) => format!("{}/{}/revisions/{}", Self::COLLECTION_PATH, key.number(), revision),
            None => format!("{}/{}", Self::COLLECTION_PATH, key.number()),
        }
    }
}

impl ApiResource for Customer {
    const TYPE_NAME: &'static str = "Customer";
    const COLLECTION_PATH: &'static str = "/customers";
}

impl ApiResource for Component {
    const TYPE_NAME: &'static str = "Component";
    const COLLECTION_PATH: &'static str = "/components";
}
