//! In-memory [`ClientStore`] for tests and offline use.
//!
//! Records live in a `Vec` behind a `RwLock`, so iteration order is insertion
//! order. A failure message can be injected to exercise the error paths of
//! the directory.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{ClientRecord, ClientStore, DirectoryError};

pub struct InMemoryClientStore {
    records: RwLock<Vec<ClientRecord>>,
    failure: Mutex<Option<String>>,
    fetches: AtomicUsize,
    label: String,
}

impl InMemoryClientStore {
    pub fn new(records: Vec<ClientRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            failure: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            label: "memory".to_string(),
        }
    }

    /// Loads a JSON array of `{"name": ..., "email": ...}` objects
    pub fn from_json_file(path: &Path) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DirectoryError::InvalidData(format!("cannot read {}: {}", path.display(), e))
        })?;
        let records: Vec<ClientRecord> = serde_json::from_str(&raw).map_err(|e| {
            DirectoryError::InvalidData(format!("{} is not a client list: {}", path.display(), e))
        })?;

        debug!("Loaded {} client(s) from {}", records.len(), path.display());

        let mut store = Self::new(records);
        store.label = format!("file:{}", path.display());
        Ok(store)
    }

    pub fn insert(&self, record: ClientRecord) {
        if let Ok(mut records) = self.records.write() {
            records.push(record);
        }
    }

    /// Makes every subsequent call fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }

    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    /// Number of `fetch_all` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), DirectoryError> {
        let failure = self
            .failure
            .lock()
            .map_err(|e| DirectoryError::Query(format!("store lock poisoned: {}", e)))?;
        match failure.as_ref() {
            Some(message) => Err(DirectoryError::Query(message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryClientStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn fetch_all(&self) -> Result<Vec<ClientRecord>, DirectoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let records = self
            .records
            .read()
            .map_err(|e| DirectoryError::Query(format!("store lock poisoned: {}", e)))?;
        Ok(records.clone())
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        self.check_failure()
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
