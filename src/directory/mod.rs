//! Client directory: fuzzy lookup of meeting counterparts
//!
//! The directory owns a [`ClientStore`] (MongoDB in production, in-memory for
//! tests and offline use), scans every record for a lookup and keeps the best
//! fuzzy match above a threshold.
//!
//! A lookup never fails outright. Store errors become
//! [`LookupOutcome::Failed`], which callers can tell apart from
//! [`LookupOutcome::NotFound`] but which still degrades to "not a client"
//! when turned into a [`LookupResult`].

mod memory;
mod mongo;
pub mod similarity;

pub use memory::InMemoryClientStore;
pub use mongo::MongoClientStore;
pub use similarity::similarity_score;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Default similarity a stored name must exceed to count as a match
pub const DEFAULT_MATCH_THRESHOLD: u8 = 90;

/// One stored client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub name: String,
    pub email: String,
}

impl ClientRecord {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// What the rest of the pipeline needs to know about a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub exists: bool,
    pub email: Option<String>,
}

impl LookupResult {
    pub fn found(email: impl Into<String>) -> Self {
        Self {
            exists: true,
            email: Some(email.into()),
        }
    }

    pub fn not_found() -> Self {
        Self {
            exists: false,
            email: None,
        }
    }
}

/// Full outcome of a lookup, keeping "absent" and "query failed" distinct
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found { record: ClientRecord, score: u8 },
    NotFound { best_score: u8 },
    Failed { reason: String },
}

impl LookupOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found { .. })
    }

    pub fn to_result(&self) -> LookupResult {
        LookupResult::from(self)
    }
}

impl From<&LookupOutcome> for LookupResult {
    fn from(outcome: &LookupOutcome) -> Self {
        match outcome {
            LookupOutcome::Found { record, .. } => LookupResult::found(record.email.clone()),
            LookupOutcome::NotFound { .. } | LookupOutcome::Failed { .. } => {
                LookupResult::not_found()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("client store {store} is unavailable: {reason}")]
    Unavailable { store: String, reason: String },

    #[error("client query failed: {0}")]
    Query(String),

    #[error("invalid client data: {0}")]
    InvalidData(String),
}

/// Backing collection of client records
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Every stored record, in the store's natural iteration order
    async fn fetch_all(&self) -> Result<Vec<ClientRecord>, DirectoryError>;

    /// Cheap round trip proving the store is reachable
    async fn ping(&self) -> Result<(), DirectoryError>;

    /// Human-readable location of the store for logs and health output
    fn describe(&self) -> String;
}

pub struct ClientDirectory {
    store: Arc<dyn ClientStore>,
    threshold: u8,
}

impl ClientDirectory {
    /// Pings the store and returns a ready directory
    ///
    /// # Errors
    ///
    /// `DirectoryError::Unavailable` when the store cannot be reached.
    pub async fn connect(store: Arc<dyn ClientStore>, threshold: u8) -> Result<Self, DirectoryError> {
        let description = store.describe();
        store.ping().await.map_err(|e| {
            error!("Client store {} is unreachable: {}", description, e);
            DirectoryError::Unavailable {
                store: description.clone(),
                reason: e.to_string(),
            }
        })?;

        info!("Connected to client store {}", description);
        Ok(Self { store, threshold })
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn store(&self) -> &Arc<dyn ClientStore> {
        &self.store
    }

    /// Finds the stored client whose name best matches `candidate`
    ///
    /// The match must score strictly above the threshold. On equal scores
    /// the record seen first wins.
    pub async fn lookup(&self, candidate: &str) -> LookupOutcome {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return LookupOutcome::NotFound { best_score: 0 };
        }

        let records = match self.store.fetch_all().await {
            Ok(records) => records,
            Err(e) => {
                error!(
                    candidate,
                    store = %self.store.describe(),
                    "Client lookup failed: {}",
                    e
                );
                return LookupOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let mut best: Option<(&ClientRecord, u8)> = None;
        for record in &records {
            let score = similarity_score(&record.name, candidate);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((record, score));
            }
        }

        match best {
            Some((record, score)) if score > self.threshold => {
                debug!(candidate, matched = %record.name, score, "Client found");
                LookupOutcome::Found {
                    record: record.clone(),
                    score,
                }
            }
            Some((record, score)) => {
                debug!(
                    candidate,
                    closest = %record.name,
                    score,
                    threshold = self.threshold,
                    "No client above threshold"
                );
                LookupOutcome::NotFound { best_score: score }
            }
            None => {
                debug!(candidate, "Client store is empty");
                LookupOutcome::NotFound { best_score: 0 }
            }
        }
    }
}

impl std::fmt::Debug for ClientDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientDirectory")
            .field("store", &self.store.describe())
            .field("threshold", &self.threshold)
            .finish()
    }
}
