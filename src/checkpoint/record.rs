//! Processing record type

use crate::key::ResourceKey;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Naive layouts accepted for `dt`, read as UTC
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// One processed resource, written after its handler returned
///
/// Records are append-only. The resource type is not stored on the record itself;
/// the store partitions records by type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    #[serde(rename = "id")]
    resource_key: ResourceKey,
    #[serde(rename = "dt", deserialize_with = "deserialize_timestamp")]
    processed_at: DateTime<Utc>,
    #[serde(rename = "s")]
    success: bool,
    /// Store-wide write sequence, breaks ties between equal timestamps
    #[serde(default)]
    seq: u64,
}

impl ProcessingRecord {
    /// Create a record
    pub fn new(resource_key: ResourceKey, processed_at: DateTime<Utc>, success: bool, seq: u64) -> Self {
        Self {
            resource_key,
            processed_at,
            success,
            seq,
        }
    }

    /// Key of the processed resource
    pub fn resource_key(&self) -> ResourceKey {
        self.resource_key
    }

    /// When the handler finished
    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    /// Whether the handler succeeded
    pub fn success(&self) -> bool {
        self.success
    }

    /// Write sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Ordering used to pick the checkpoint: timestamp first, then write sequence
    pub fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.processed_at, self.seq)
    }
}

/// Parse a checkpoint timestamp
///
/// RFC 3339 with an offset, or a naive ISO date-time (`T` or space separator)
/// taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}")))
}
