//! Checkpoint store persistence
//!
//! Every `record` appends to the in-memory log and rewrites the whole file
//! atomically (temp file, fsync, rename, directory fsync) before returning.

use super::lock::StoreLock;
use super::record::ProcessingRecord;
use crate::key::{ResourceKey, ResourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Current checkpoint file schema version
const SCHEMA_VERSION: &str = "1.0.0";

/// Maximum allowed checkpoint file size (64 MB) to prevent memory exhaustion
pub const MAX_STORE_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Checkpoint store shared by the listeners of one driver
pub type SharedStore = Arc<Mutex<CheckpointStore>>;

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    schema_version: String,
    next_seq: u64,
    records: BTreeMap<String, Vec<ProcessingRecord>>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            next_seq: 1,
            records: BTreeMap::new(),
        }
    }
}

impl StoreFile {
    /// Upgrade a bare `{type: [records]}` mapping written without an envelope
    ///
    /// Legacy records carry no sequence number; list order is their write order.
    fn from_legacy(mut records: BTreeMap<String, Vec<ProcessingRecord>>) -> Self {
        let mut next_seq = 1;
        for list in records.values_mut() {
            for record in list.iter_mut() {
                record.set_seq(next_seq);
                next_seq += 1;
            }
        }
        info!(
            resource_types = records.len(),
            new_version = SCHEMA_VERSION,
            "Migrated legacy checkpoint file"
        );
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            next_seq,
            records,
        }
    }
}

/// Per-type counts for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    /// Resource type name
    pub resource_type: String,
    /// Number of records
    pub total: usize,
    /// Records whose handler succeeded
    pub succeeded: usize,
    /// Records whose handler failed
    pub failed: usize,
    /// Current checkpoint
    pub last_processed: Option<ResourceKey>,
    /// Timestamp of the checkpoint record
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Durable, append-only log of processing outcomes
///
/// A writable store owns its file exclusively for as long as it is open. A
/// read-only store takes no lock and refuses every write.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: StoreFile,
    lock: Option<StoreLock>,
}

impl CheckpointStore {
    /// Open (or create) the checkpoint store at `path`
    ///
    /// Fails with [`CheckpointError::Locked`] if another process owns the file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        let lock = StoreLock::try_acquire(&path)?;
        let state = Self::load_or_default(&path)?;

        Ok(Self {
            path,
            state,
            lock: Some(lock),
        })
    }

    /// Open a snapshot of the store without taking the lock
    ///
    /// Works while another process owns the file; saves are atomic renames so the
    /// snapshot is always a complete file. Writes fail with
    /// [`CheckpointError::ReadOnly`].
    pub fn open_read_only(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        let state = Self::load_or_default(&path)?;
        Ok(Self {
            path,
            state,
            lock: None,
        })
    }

    fn load_or_default(path: &Path) -> Result<StoreFile, CheckpointError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No checkpoint file found, starting empty");
            Ok(StoreFile::default())
        }
    }

    /// Whether writes are refused
    pub fn is_read_only(&self) -> bool {
        self.lock.is_none()
    }

    fn ensure_writable(&self) -> Result<(), CheckpointError> {
        if self.is_read_only() {
            return Err(CheckpointError::ReadOnly(self.path.display().to_string()));
        }
        Ok(())
    }

    /// Open the store and wrap it for sharing between listeners
    pub fn open_shared(path: impl Into<PathBuf>) -> Result<SharedStore, CheckpointError> {
        Ok(Arc::new(Mutex::new(Self::open(path)?)))
    }

    /// Path of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record stamped with the current time and persist the store
    ///
    /// The stamp never goes below the type's current checkpoint timestamp, so a
    /// wall clock stepping backwards cannot demote the new record.
    pub fn record(
        &mut self,
        resource_type: &ResourceType,
        resource_key: ResourceKey,
        success: bool,
    ) -> Result<(), CheckpointError> {
        let now = Utc::now();
        let at = match self.latest(resource_type) {
            Some(latest) if latest.processed_at() > now => {
                warn!(
                    resource_type = %resource_type,
                    clock = %now,
                    checkpoint_at = %latest.processed_at(),
                    "Clock is behind the checkpoint, reusing its timestamp"
                );
                latest.processed_at()
            }
            _ => now,
        };
        self.record_at(resource_type, resource_key, success, at)
    }

    /// Append a record with an explicit timestamp and persist the store
    ///
    /// The in-memory log is left unchanged if persisting fails.
    pub fn record_at(
        &mut self,
        resource_type: &ResourceType,
        resource_key: ResourceKey,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<(), CheckpointError> {
        self.ensure_writable()?;
        let seq = self.state.next_seq;
        self.state
            .records
            .entry(resource_type.as_str().to_string())
            .or_default()
            .push(ProcessingRecord::new(resource_key, at, success, seq));
        self.state.next_seq += 1;

        if let Err(e) = self.save() {
            if let Some(list) = self.state.records.get_mut(resource_type.as_str()) {
                list.pop();
            }
            self.state.next_seq -= 1;
            return Err(e);
        }

        crate::metrics::record_checkpoint_write(resource_type.as_str());
        debug!(
            resource_type = %resource_type,
            key = %resource_key,
            success,
            seq,
            "Recorded processing outcome"
        );
        Ok(())
    }

    /// Key of the most recent record for `resource_type`
    ///
    /// "Most recent" is the greatest `processed_at`, ties broken by write sequence.
    /// Key ordering plays no part.
    pub fn last_processed(&self, resource_type: &ResourceType) -> Option<ResourceKey> {
        self.latest(resource_type).map(ProcessingRecord::resource_key)
    }

    fn latest(&self, resource_type: &ResourceType) -> Option<&ProcessingRecord> {
        self.records(resource_type)
            .iter()
            .max_by_key(|record| record.recency())
    }

    /// Remove the records of one type, or of every type when `None`
    pub fn clear(&mut self, resource_type: Option<&ResourceType>) -> Result<(), CheckpointError> {
        self.ensure_writable()?;
        let previous = self.state.clone();
        match resource_type {
            Some(ty) => {
                self.state.records.remove(ty.as_str());
                info!(resource_type = %ty, "Cleared checkpoint records");
            }
            None => {
                self.state.records.clear();
                info!("Cleared all checkpoint records");
            }
        }

        if let Err(e) = self.save() {
            self.state = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Records of one type in write order
    pub fn records(&self, resource_type: &ResourceType) -> &[ProcessingRecord] {
        self.state
            .records
            .get(resource_type.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of all resource types with at least one record
    pub fn resource_types(&self) -> Vec<String> {
        self.state
            .records
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Counts and checkpoint for one type
    pub fn summary(&self, resource_type: &ResourceType) -> StoreSummary {
        let records = self.records(resource_type);
        let succeeded = records.iter().filter(|r| r.success()).count();
        let latest = self.latest(resource_type);
        StoreSummary {
            resource_type: resource_type.to_string(),
            total: records.len(),
            succeeded,
            failed: records.len() - succeeded,
            last_processed: latest.map(ProcessingRecord::resource_key),
            last_processed_at: latest.map(ProcessingRecord::processed_at),
        }
    }

    /// Rewrite the checkpoint file atomically
    fn save(&self) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        let parent_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| CheckpointError::Io(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| CheckpointError::Io(format!("Failed to write temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| CheckpointError::Io(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| CheckpointError::Io(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| CheckpointError::Io(format!("Failed to persist temp file: {e}")))?;

        sync_dir(parent_dir)?;

        debug!(
            path = %self.path.display(),
            next_seq = self.state.next_seq,
            "Checkpoint file saved"
        );
        Ok(())
    }

    fn load(path: &Path) -> Result<StoreFile, CheckpointError> {
        debug!(path = %path.display(), "Loading checkpoint file");

        let metadata = std::fs::metadata(path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        if metadata.len() > MAX_STORE_FILE_SIZE {
            return Err(CheckpointError::StateTooLarge {
                size: metadata.len(),
                max: MAX_STORE_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        if contents.trim().is_empty() {
            return Ok(StoreFile::default());
        }

        let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            warn!(error = %e, "Failed to parse checkpoint file");
            CheckpointError::Deserialization(e.to_string())
        })?;

        let state = match value.get("schema_version").and_then(|v| v.as_str()) {
            Some(SCHEMA_VERSION) => serde_json::from_value::<StoreFile>(value)
                .map_err(|e| CheckpointError::Deserialization(e.to_string()))?,
            Some(found) => {
                warn!(
                    found_version = found,
                    expected_version = SCHEMA_VERSION,
                    "Checkpoint file schema version mismatch"
                );
                return Err(CheckpointError::SchemaVersionMismatch {
                    expected: SCHEMA_VERSION.to_string(),
                    found: found.to_string(),
                });
            }
            None => {
                let legacy = serde_json::from_value(value)
                    .map_err(|e| CheckpointError::Deserialization(e.to_string()))?;
                StoreFile::from_legacy(legacy)
            }
        };

        info!(
            resource_types = state.records.len(),
            next_seq = state.next_seq,
            "Checkpoint file loaded"
        );
        Ok(state)
    }
}

/// Fsync a directory so a rename inside it survives a crash
fn sync_dir(dir: &Path) -> Result<(), CheckpointError> {
    std::fs::File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(|e| CheckpointError::Io(format!("Failed to sync checkpoint directory: {e}")))
}

/// Errors related to checkpoint persistence
///
/// All of these are fatal to the driver: continuing without a trustworthy
/// checkpoint risks processing resources twice.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Checkpoint file too large
    #[error("checkpoint file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The file is owned by another process
    #[error("checkpoint store locked: {0}")]
    Locked(String),

    /// Write attempted on a store opened read-only
    #[error("checkpoint store opened read-only: {0}")]
    ReadOnly(String),
}
