//! Ownership store capability
//!
//! Records which identity created which container. Records are written once
//! when a create call succeeds and removed once when the matching delete call
//! succeeds; there is no update.

use crate::error::Result;
use crate::types::OwnershipRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresOwnershipStore;

/// Ownership store trait
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// Record that `record.owner` created container `record.id`
    async fn set_owner(&self, record: &OwnershipRecord) -> Result<()>;

    /// Forget the ownership of container `record.id`
    async fn remove_owner(&self, record: &OwnershipRecord) -> Result<()>;
}

/// In-memory ownership store keyed by container id
#[derive(Clone, Default)]
pub struct InMemoryOwnershipStore {
    records: Arc<RwLock<HashMap<String, OwnershipRecord>>>,
}

impl InMemoryOwnershipStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the record for a container id
    pub async fn owner_of(&self, id: &str) -> Option<OwnershipRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Number of tracked containers
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no containers are tracked
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl OwnershipStore for InMemoryOwnershipStore {
    async fn set_owner(&self, record: &OwnershipRecord) -> Result<()> {
        // First write wins; records are immutable until removed
        self.records
            .write()
            .await
            .entry(record.id.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn remove_owner(&self, record: &OwnershipRecord) -> Result<()> {
        self.records.write().await.remove(&record.id);
        Ok(())
    }
}
