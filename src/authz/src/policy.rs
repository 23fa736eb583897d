//! Policy store capability
//!
//! The plugin never interprets policy rules itself. It asks a store whether a
//! single `(subject, resource_type, resource_value, options)` tuple is
//! granted. Each pre-call evaluation opens one [`PolicySession`] and drops it
//! when done, so per-call resources (a pooled connection, for instance) are
//! released on every exit path.

use crate::error::Result;
use crate::types::{PolicyQuery, ResourceType};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresPolicyStore;

/// Policy store trait
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Acquire a session for one evaluation
    async fn open(&self) -> Result<Box<dyn PolicySession>>;
}

/// Per-evaluation handle on a policy store. Dropping it closes it.
#[async_trait]
pub trait PolicySession: Send {
    /// Is this exact query granted?
    async fn validate(&mut self, query: &PolicyQuery) -> Result<bool>;
}

/// A single grant held by [`InMemoryPolicyStore`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grant {
    pub subject: String,
    pub resource_type: ResourceType,
    pub resource_value: String,
    pub options: String,
}

impl From<&PolicyQuery> for Grant {
    fn from(query: &PolicyQuery) -> Self {
        Self {
            subject: query.subject.clone(),
            resource_type: query.resource_type,
            resource_value: query.resource_value.clone(),
            options: query.options.clone(),
        }
    }
}

/// In-memory policy store implementation
#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    grants: Arc<RwLock<HashSet<Grant>>>,
}

impl InMemoryPolicyStore {
    /// Create an empty store; every query is denied
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant the exact tuple described by `query`
    pub async fn grant(&self, query: PolicyQuery) {
        self.grants.write().await.insert(Grant::from(&query));
    }

    /// Revoke a previously granted tuple
    pub async fn revoke(&self, query: &PolicyQuery) -> bool {
        self.grants.write().await.remove(&Grant::from(query))
    }

    /// Number of grants held
    pub async fn len(&self) -> usize {
        self.grants.read().await.len()
    }

    /// Whether the store holds no grants
    pub async fn is_empty(&self) -> bool {
        self.grants.read().await.is_empty()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn open(&self) -> Result<Box<dyn PolicySession>> {
        Ok(Box::new(InMemorySession {
            grants: Arc::clone(&self.grants),
        }))
    }
}

struct InMemorySession {
    grants: Arc<RwLock<HashSet<Grant>>>,
}

#[async_trait]
impl PolicySession for InMemorySession {
    async fn validate(&mut self, query: &PolicyQuery) -> Result<bool> {
        Ok(self.grants.read().await.contains(&Grant::from(query)))
    }
}
