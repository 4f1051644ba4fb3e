//! MongoDB-backed [`ClientStore`]
//!
//! Reads the `clients` collection of the `meeting_scheduling` database (both
//! configurable). Documents are scanned in natural order; any document
//! missing a string `name` or `email` is skipped.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::{debug, warn};

use super::{ClientRecord, ClientStore, DirectoryError};

pub struct MongoClientStore {
    client: Client,
    database: Database,
    collection: Collection<Document>,
    description: String,
}

impl MongoClientStore {
    /// Builds a store handle; no round trip happens until the first call
    ///
    /// `selection_timeout` bounds how long the driver waits for a reachable
    /// server before failing an operation.
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
        selection_timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let unavailable = |reason: String| DirectoryError::Unavailable {
            store: format!("mongodb:{}/{}", database, collection),
            reason,
        };

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| unavailable(format!("invalid connection string: {}", e)))?;
        options.server_selection_timeout = Some(selection_timeout);
        options.app_name = Some(crate::NAME.to_string());

        let client = Client::with_options(options).map_err(|e| unavailable(e.to_string()))?;
        let db = client.database(database);
        let coll = db.collection::<Document>(collection);

        Ok(Self {
            client,
            database: db,
            collection: coll,
            description: format!("mongodb:{}/{}", database, collection),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn record_from_document(document: &Document) -> Option<ClientRecord> {
    let name = document.get_str("name").ok()?;
    let email = document.get_str("email").ok()?;
    Some(ClientRecord::new(name, email))
}

#[async_trait]
impl ClientStore for MongoClientStore {
    async fn fetch_all(&self) -> Result<Vec<ClientRecord>, DirectoryError> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .await
            .map_err(|e| DirectoryError::Query(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| DirectoryError::Query(e.to_string()))?
        {
            match record_from_document(&document) {
                Some(record) => records.push(record),
                None => warn!(
                    id = ?document.get("_id"),
                    "Skipping client document without string name/email"
                ),
            }
        }

        debug!("Fetched {} client record(s) from {}", records.len(), self.description);
        Ok(records)
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| DirectoryError::Unavailable {
                store: self.description.clone(),
                reason: e.to_string(),
            })
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
