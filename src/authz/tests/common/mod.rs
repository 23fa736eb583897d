//! Stub stores shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hbm_authz::{
    AuthzError, OwnershipRecord, OwnershipStore, PolicyQuery, PolicySession, PolicyStore, Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Policy store that logs every query and grants the ones `grant` accepts
#[derive(Clone)]
pub struct RecordingPolicyStore {
    grant: Arc<dyn Fn(usize, &PolicyQuery) -> bool + Send + Sync>,
    queries: Arc<Mutex<Vec<PolicyQuery>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl RecordingPolicyStore {
    /// `grant` receives the 1-based position of the query within its session
    pub fn new(grant: impl Fn(usize, &PolicyQuery) -> bool + Send + Sync + 'static) -> Self {
        Self {
            grant: Arc::new(grant),
            queries: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn denying() -> Self {
        Self::new(|_, _| false)
    }

    pub fn queries(&self) -> Vec<PolicyQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyStore for RecordingPolicyStore {
    async fn open(&self) -> Result<Box<dyn PolicySession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            store: self.clone(),
            position: 0,
        }))
    }
}

struct RecordingSession {
    store: RecordingPolicyStore,
    position: usize,
}

#[async_trait]
impl PolicySession for RecordingSession {
    async fn validate(&mut self, query: &PolicyQuery) -> Result<bool> {
        self.position += 1;
        self.store.queries.lock().unwrap().push(query.clone());
        Ok((self.store.grant)(self.position, query))
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.store.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Policy store that fails the test if it is consulted at all
pub struct UntouchablePolicyStore;

#[async_trait]
impl PolicyStore for UntouchablePolicyStore {
    async fn open(&self) -> Result<Box<dyn PolicySession>> {
        panic!("policy store must not be consulted");
    }
}

/// Policy store whose queries fail after the session opens
#[derive(Clone, Default)]
pub struct BrokenPolicyStore {
    closed: Arc<AtomicUsize>,
}

impl BrokenPolicyStore {
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyStore for BrokenPolicyStore {
    async fn open(&self) -> Result<Box<dyn PolicySession>> {
        Ok(Box::new(BrokenSession {
            closed: self.closed.clone(),
        }))
    }
}

struct BrokenSession {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl PolicySession for BrokenSession {
    async fn validate(&mut self, _query: &PolicyQuery) -> Result<bool> {
        Err(AuthzError::PolicyStore("connection refused".to_string()))
    }
}

impl Drop for BrokenSession {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Ownership command seen by [`RecordingOwnershipStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipCommand {
    Set(OwnershipRecord),
    Remove(OwnershipRecord),
}

/// Ownership store that logs commands, optionally failing each one
#[derive(Clone, Default)]
pub struct RecordingOwnershipStore {
    commands: Arc<Mutex<Vec<OwnershipCommand>>>,
    fail: bool,
}

impl RecordingOwnershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<OwnershipCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: OwnershipCommand) -> Result<()> {
        self.commands.lock().unwrap().push(command);
        if self.fail {
            return Err(AuthzError::OwnershipStore("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OwnershipStore for RecordingOwnershipStore {
    async fn set_owner(&self, record: &OwnershipRecord) -> Result<()> {
        self.record(OwnershipCommand::Set(record.clone()))
    }

    async fn remove_owner(&self, record: &OwnershipRecord) -> Result<()> {
        self.record(OwnershipCommand::Remove(record.clone()))
    }
}
