//! In-memory transport, inventory and dead-letter sink for pipeline tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::inventory::{InventoryClient, InventoryError, SpoolRecord};
use crate::pipeline::{DeadLetterMessage, DeadLetterSink};
use crate::transport::{InboundMessage, Transport, TransportError};

/// A record published through `MemoryTransport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

/// In-memory transport.
///
/// `rewind` puts the message back at the head of the inbox, mirroring a
/// Kafka seek. Once the inbox is empty `next` cancels the drain token (if
/// set) and then waits for cancellation.
#[derive(Default)]
pub struct MemoryTransport {
    inbox: RwLock<VecDeque<InboundMessage>>,
    published: RwLock<Vec<PublishedMessage>>,
    committed: RwLock<Vec<InboundMessage>>,
    rewound: RwLock<Vec<InboundMessage>>,
    publish_failures: AtomicUsize,
    commit_failures: AtomicUsize,
    stalled_publishes: AtomicBool,
    failing_rewinds: AtomicBool,
    drained: Option<CancellationToken>,
    next_offset: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` once every queued message has been fetched
    pub fn shutdown_when_drained(mut self, token: CancellationToken) -> Self {
        self.drained = Some(token);
        self
    }

    /// Queue a message on partition 0 at the next offset
    pub fn push(&self, key: Option<&str>, payload: &[u8]) -> InboundMessage {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst) as i64;
        let message = InboundMessage {
            topic: "spool-transfer-ready".to_string(),
            partition: 0,
            offset,
            key: key.map(|k| k.as_bytes().to_vec()),
            payload: payload.to_vec(),
        };
        self.inbox
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(message.clone());
        message
    }

    /// Fail the next `count` publishes
    pub fn fail_next_publishes(&self, count: usize) {
        self.publish_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` commits
    pub fn fail_next_commits(&self, count: usize) {
        self.commit_failures.store(count, Ordering::SeqCst);
    }

    /// Make every publish wait forever
    pub fn stall_publishes(&self) {
        self.stalled_publishes.store(true, Ordering::SeqCst);
    }

    /// Make every rewind fail
    pub fn fail_rewinds(&self) {
        self.failing_rewinds.store(true, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn committed(&self) -> Vec<InboundMessage> {
        self.committed
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn committed_offsets(&self) -> Vec<i64> {
        self.committed().iter().map(|m| m.offset).collect()
    }

    pub fn rewound(&self) -> Vec<InboundMessage> {
        self.rewound
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn next(&self, cancel: &CancellationToken) -> Result<InboundMessage, TransportError> {
        let queued = self
            .inbox
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(message) = queued {
            return Ok(message);
        }

        if let Some(token) = &self.drained {
            token.cancel();
        }
        cancel.cancelled().await;
        Err(TransportError::Cancelled)
    }

    async fn commit(
        &self,
        cancel: &CancellationToken,
        message: &InboundMessage,
    ) -> Result<(), TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if Self::take_failure(&self.commit_failures) {
            return Err(TransportError::Kafka("commit rejected".to_string()));
        }
        self.committed
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }

    async fn publish(
        &self,
        cancel: &CancellationToken,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<(), TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if self.stalled_publishes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if Self::take_failure(&self.publish_failures) {
            return Err(TransportError::Kafka("broker unavailable".to_string()));
        }
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                key: key.map(<[u8]>::to_vec),
                value: value.to_vec(),
            });
        Ok(())
    }

    async fn rewind(&self, message: &InboundMessage) -> Result<(), TransportError> {
        if self.failing_rewinds.load(Ordering::SeqCst) {
            return Err(TransportError::Kafka("seek failed".to_string()));
        }
        self.rewound
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        self.inbox
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push_front(message.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryCall {
    ListLocations,
    GetSpool,
    UpdateSpoolLocation,
}

/// In-memory inventory with per-call failure injection.
///
/// Calls observe cancellation before doing anything. `shutdown_after`
/// cancels a token right after the named call succeeds, which lets tests
/// place a shutdown at an exact point in the pipeline.
#[derive(Default)]
pub struct StaticInventory {
    locations: RwLock<HashSet<String>>,
    spools: RwLock<HashMap<String, String>>,
    calls: RwLock<Vec<InventoryCall>>,
    updates: RwLock<Vec<(String, String)>>,
    failures: RwLock<HashMap<InventoryCall, InventoryError>>,
    shutdown_after: RwLock<Option<(InventoryCall, CancellationToken)>>,
}

impl StaticInventory {
    pub fn new(locations: &[&str]) -> Self {
        let inventory = Self::default();
        inventory
            .locations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .extend(locations.iter().map(|l| l.to_string()));
        inventory
    }

    pub fn with_spool(self, spool_id: &str, location_id: &str) -> Self {
        self.spools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(spool_id.to_string(), location_id.to_string());
        self
    }

    /// Make every `call` fail with `error`
    pub fn fail(&self, call: InventoryCall, error: InventoryError) {
        self.failures
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(call, error);
    }

    pub fn shutdown_after(&self, call: InventoryCall, token: CancellationToken) {
        *self
            .shutdown_after
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some((call, token));
    }

    pub fn calls(&self) -> Vec<InventoryCall> {
        self.calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// `(spool_id, location_id)` pairs applied by `update_spool_location`
    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn spool_location(&self, spool_id: &str) -> Option<String> {
        self.spools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(spool_id)
            .cloned()
    }

    fn enter(&self, call: InventoryCall, cancel: &CancellationToken) -> Result<(), InventoryError> {
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        if cancel.is_cancelled() {
            return Err(InventoryError::Cancelled);
        }
        match self
            .failures
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&call)
        {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn leave(&self, call: InventoryCall) {
        if let Some((trigger, token)) = &*self
            .shutdown_after
            .read()
            .unwrap_or_else(|e| e.into_inner())
        {
            if *trigger == call {
                token.cancel();
            }
        }
    }
}

#[async_trait]
impl InventoryClient for StaticInventory {
    async fn list_locations(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, InventoryError> {
        self.enter(InventoryCall::ListLocations, cancel)?;
        let locations = self
            .locations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        self.leave(InventoryCall::ListLocations);
        Ok(locations)
    }

    async fn get_spool(
        &self,
        cancel: &CancellationToken,
        spool_id: &str,
    ) -> Result<SpoolRecord, InventoryError> {
        self.enter(InventoryCall::GetSpool, cancel)?;
        let location_id = self
            .spool_location(spool_id)
            .ok_or_else(|| InventoryError::NotFound(spool_id.to_string()))?;
        self.leave(InventoryCall::GetSpool);
        Ok(SpoolRecord {
            spool_id: spool_id.to_string(),
            location_id,
        })
    }

    async fn update_spool_location(
        &self,
        cancel: &CancellationToken,
        spool_id: &str,
        location_id: &str,
    ) -> Result<(), InventoryError> {
        self.enter(InventoryCall::UpdateSpoolLocation, cancel)?;
        {
            let mut spools = self.spools.write().unwrap_or_else(|e| e.into_inner());
            match spools.get_mut(spool_id) {
                Some(current) => *current = location_id.to_string(),
                None => return Err(InventoryError::NotFound(spool_id.to_string())),
            }
        }
        self.updates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((spool_id.to_string(), location_id.to_string()));
        self.leave(InventoryCall::UpdateSpoolLocation);
        Ok(())
    }
}

/// Dead-letter sink that keeps letters in memory
#[derive(Default)]
pub struct MemoryDeadLetters {
    letters: RwLock<Vec<DeadLetterMessage>>,
    keys: RwLock<Vec<Option<Vec<u8>>>>,
}

impl MemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn letters(&self) -> Vec<DeadLetterMessage> {
        self.letters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Record keys the letters were sent under
    pub fn keys(&self) -> Vec<Option<Vec<u8>>> {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetters {
    async fn send(&self, key: Option<&[u8]>, letter: &DeadLetterMessage) -> Result<()> {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.map(<[u8]>::to_vec));
        self.letters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(letter.clone());
        Ok(())
    }
}
