//! Resource type names and resource keys
//!
//! A [`ResourceType`] partitions the checkpoint store; a [`ResourceKey`] identifies one
//! resource within its type. Keys are either a plain sequence number (orders) or a
//! `(number, revision)` pair (quotes), where a missing revision is its own distinct state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable name of a class of trackable resources (e.g. "Order", "Quote")
///
/// Used verbatim as the partition key in the checkpoint file, so it must not change
/// between releases for the same kind of resource.
///
/// # Examples
///
/// ```
/// use order_desk_client::key::ResourceType;
///
/// let ty = ResourceType::parse("Order").unwrap();
/// assert_eq!(ty.as_str(), "Order");
/// assert_eq!(ty, ResourceType::order());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    /// Parse a resource type name
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains whitespace.
    pub fn parse(name: &str) -> Result<Self, KeyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KeyError::InvalidResourceType(
                "resource type cannot be empty".to_string(),
            ));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(KeyError::InvalidResourceType(format!(
                "resource type '{name}' cannot contain whitespace"
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// Resource type for orders
    pub fn order() -> Self {
        Self("Order".to_string())
    }

    /// Resource type for quotes
    pub fn quote() -> Self {
        Self("Quote".to_string())
    }

    /// The name used as storage key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shape of the keys a resource type uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Single increasing integer (order number)
    Sequential,
    /// `(number, revision)` pair where revision may be absent (quotes)
    Revisioned,
}

impl KeyKind {
    /// Zero-equivalent key, used when a collection is empty and no default was given
    pub fn zero(self) -> ResourceKey {
        match self {
            KeyKind::Sequential => ResourceKey::Number(0),
            KeyKind::Revisioned => ResourceKey::Revision(0, None),
        }
    }
}

/// Unique identifier of a resource within its type
///
/// Serialized as a bare integer for [`ResourceKey::Number`] and as a two element
/// array `[number, revision|null]` for [`ResourceKey::Revision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceKey {
    /// Plain sequence number
    Number(u64),
    /// Number plus optional revision
    Revision(u64, Option<u32>),
}

impl ResourceKey {
    /// Parse a key of the given kind from `N` or `N:REV`
    ///
    /// # Examples
    ///
    /// ```
    /// use order_desk_client::key::{KeyKind, ResourceKey};
    ///
    /// assert_eq!(ResourceKey::parse("42", KeyKind::Sequential).unwrap(), ResourceKey::Number(42));
    /// assert_eq!(
    ///     ResourceKey::parse("10:2", KeyKind::Revisioned).unwrap(),
    ///     ResourceKey::Revision(10, Some(2))
    /// );
    /// assert_eq!(
    ///     ResourceKey::parse("10", KeyKind::Revisioned).unwrap(),
    ///     ResourceKey::Revision(10, None)
    /// );
    /// ```
    pub fn parse(s: &str, kind: KeyKind) -> Result<Self, KeyError> {
        let s = s.trim();
        let parse_number = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|e| KeyError::InvalidKey(format!("'{part}' is not a valid number: {e}")))
        };

        match kind {
            KeyKind::Sequential => {
                if s.contains(':') {
                    return Err(KeyError::InvalidKey(format!(
                        "'{s}' has a revision but the resource type uses plain numbers"
                    )));
                }
                Ok(ResourceKey::Number(parse_number(s)?))
            }
            KeyKind::Revisioned => match s.split_once(':') {
                None => Ok(ResourceKey::Revision(parse_number(s)?, None)),
                Some((number, revision)) => {
                    let revision = revision.trim().parse::<u32>().map_err(|e| {
                        KeyError::InvalidKey(format!("'{revision}' is not a valid revision: {e}"))
                    })?;
                    Ok(ResourceKey::Revision(parse_number(number)?, Some(revision)))
                }
            },
        }
    }

    /// The resource number, regardless of kind
    pub fn number(&self) -> u64 {
        match self {
            ResourceKey::Number(n) | ResourceKey::Revision(n, _) => *n,
        }
    }

    /// The revision, if this is a revisioned key that has one
    pub fn revision(&self) -> Option<u32> {
        match self {
            ResourceKey::Number(_) => None,
            ResourceKey::Revision(_, revision) => *revision,
        }
    }

    /// Kind of this key
    pub fn kind(&self) -> KeyKind {
        match self {
            ResourceKey::Number(_) => KeyKind::Sequential,
            ResourceKey::Revision(..) => KeyKind::Revisioned,
        }
    }

    /// Next sequential key, `None` for revisioned keys
    ///
    /// Revisioned keys have no local successor; sources ask the remote API for
    /// anything newer instead.
    pub fn next(&self) -> Option<ResourceKey> {
        match self {
            ResourceKey::Number(n) => Some(ResourceKey::Number(n.saturating_add(1))),
            ResourceKey::Revision(..) => None,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Number(n) => write!(f, "{n}"),
            ResourceKey::Revision(n, Some(rev)) => write!(f, "{n}:{rev}"),
            ResourceKey::Revision(n, None) => write!(f, "{n}"),
        }
    }
}

/// Type-specific extraction of the [`ResourceKey`] from a fetched resource
pub trait Keyed {
    /// Key identifying this resource within its type
    fn unique_identifier(&self) -> ResourceKey;
}

/// Errors that can occur parsing types and keys
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Invalid resource type name
    #[error("invalid resource type: {0}")]
    InvalidResourceType(String),

    /// Invalid resource key
    #[error("invalid resource key: {0}")]
    InvalidKey(String),
}
