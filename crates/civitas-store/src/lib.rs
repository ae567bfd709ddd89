//! Civitas Store
//!
//! Persistence for moderation records.
//!
//! Provides:
//! - The [`RecordStore`] seam used by the HTTP service
//! - An in-memory store for development and tests
//! - A Firestore store over the REST API, authenticated with a service account

pub mod credentials;
pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use civitas_core::{ModerationRecord, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use credentials::{CredentialSource, ServiceAccountKey};
pub use firestore::{FirestoreConfig, FirestoreRecordStore};
pub use memory::MemoryRecordStore;

pub const DEFAULT_COLLECTION: &str = "flagged_posts";

/// Durable collection of moderation records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record and return the identifier it was stored under
    async fn create(&self, record: &ModerationRecord) -> Result<String>;

    /// Every stored record, oldest first
    async fn list_all(&self) -> Result<Vec<ModerationRecord>>;
}

/// Which store implementation to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Firestore,
}

/// Store section of the service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub credential_source: CredentialSource,

    /// Override for the Firestore REST root, e.g. an emulator
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            collection: default_collection(),
            credential_source: CredentialSource::default(),
            base_url: None,
        }
    }
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl StoreConfig {
    /// Build the configured store.
    ///
    /// The Firestore backend loads its service-account key here, so missing
    /// credentials fail at startup.
    pub fn build(&self, http: reqwest::Client) -> Result<Arc<dyn RecordStore>> {
        match self.backend {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory record store");
                Ok(Arc::new(MemoryRecordStore::new()))
            }
            StoreBackend::Firestore => {
                let key = self.credential_source.load()?;
                let mut config = FirestoreConfig::new(key.project_id.clone(), &self.collection);
                if let Some(base_url) = &self.base_url {
                    config = config.with_base_url(base_url);
                }
                let tokens = firestore::auth::ServiceAccountTokenProvider::new(key, http.clone());
                Ok(Arc::new(FirestoreRecordStore::new(
                    config,
                    http,
                    Arc::new(tokens),
                )))
            }
        }
    }
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{MemoryRecordStore, RecordStore, StoreBackend, StoreConfig};
}
