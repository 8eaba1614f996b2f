use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use crate::error::StorageError;

/// A contact identifier waiting to be resubmitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingContact {
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
}

impl PendingContact {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Durable append-only list of pending contacts
pub trait PendingStore: Send + Sync {
    fn append(&self, record: PendingContact) -> Result<(), StorageError>;

    fn list(&self) -> Result<Vec<PendingContact>, StorageError>;

    /// Remove the first entry equal to `record`; false if none matched
    fn remove(&self, record: &PendingContact) -> Result<bool, StorageError>;
}

/// Pending queue kept as a JSON array on disk
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<PendingContact>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Write via a sibling temp file so a crash never leaves a truncated queue
    fn write(&self, records: &[PendingContact]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(records)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Pending queue written: {} entries", records.len());
        Ok(())
    }
}

impl PendingStore for JsonFileStore {
    fn append(&self, record: PendingContact) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records = self.read()?;
        info!("Queueing contact for later submission ({})", self.path.display());
        records.push(record);
        self.write(&records)
    }

    fn list(&self) -> Result<Vec<PendingContact>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read()
    }

    fn remove(&self, record: &PendingContact) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records = self.read()?;
        match records.iter().position(|r| r == record) {
            Some(index) => {
                records.remove(index);
                self.write(&records)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Non-durable store for embedding without a filesystem
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PendingContact>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingStore for MemoryStore {
    fn append(&self, record: PendingContact) -> Result<(), StorageError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    fn list(&self) -> Result<Vec<PendingContact>, StorageError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn remove(&self, record: &PendingContact) -> Result<bool, StorageError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match records.iter().position(|r| r == record) {
            Some(index) => {
                records.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
