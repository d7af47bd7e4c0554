use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::TransportError;
use crate::memory::MapRecord;
use crate::transport::{ChainKey, RecordSink, RecordSource, RegistrationId};

/// Scripted in-memory record source for tests and demos.
///
/// Responses are preloaded per key with [`MemoryFeed::script`]; each
/// registration consumes and delivers the next scripted response for its
/// key on a spawned task, mirroring the asynchronous delivery of a real
/// feed. Keys with no remaining script simply stay pending.
///
/// Registration lifecycles are counted so tests can assert on fetch
/// fan-out and on how many registrations were ever open at once.
pub struct MemoryFeed {
    scripts: DashMap<ChainKey, VecDeque<Arc<MapRecord>>>,
    open: DashMap<RegistrationId, ChainKey>,
    next_id: AtomicU64,
    fetches: DashMap<ChainKey, u64>,
    total_fetches: AtomicU64,
    max_open: AtomicUsize,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self {
            scripts: DashMap::new(),
            open: DashMap::new(),
            next_id: AtomicU64::new(1),
            fetches: DashMap::new(),
            total_fetches: AtomicU64::new(0),
            max_open: AtomicUsize::new(0),
        }
    }

    /// Preload the next response for `key`. Repeat calls queue further
    /// responses, consumed one per registration.
    pub fn script(&self, key: &ChainKey, record: MapRecord) {
        self.scripts
            .entry(key.clone())
            .or_default()
            .push_back(Arc::new(record));
    }

    /// Number of registrations ever issued for `key`.
    pub fn fetch_count(&self, key: &ChainKey) -> u64 {
        self.fetches.get(key).map(|c| *c).unwrap_or(0)
    }

    pub fn total_fetches(&self) -> u64 {
        self.total_fetches.load(Ordering::SeqCst)
    }

    /// Registrations currently open (registered, not yet unregistered).
    pub fn open_registrations(&self) -> usize {
        self.open.len()
    }

    /// High-water mark of simultaneously open registrations.
    pub fn max_open_registrations(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSource for MemoryFeed {
    async fn register(
        &self,
        key: &ChainKey,
        sink: Arc<dyn RecordSink>,
    ) -> Result<RegistrationId, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.open.insert(id, key.clone());
        *self.fetches.entry(key.clone()).or_insert(0) += 1;
        self.total_fetches.fetch_add(1, Ordering::SeqCst);
        self.max_open.fetch_max(self.open.len(), Ordering::SeqCst);

        let next = self.scripts.get_mut(key).and_then(|mut q| q.pop_front());
        match next {
            Some(record) => {
                let key = key.clone();
                tokio::spawn(async move {
                    sink.deliver(key, record).await;
                });
            }
            None => debug!(%key, "no scripted response, registration stays pending"),
        }
        Ok(id)
    }

    async fn unregister(&self, id: RegistrationId) -> Result<(), TransportError> {
        match self.open.remove(&id) {
            Some(_) => Ok(()),
            None => Err(TransportError::UnregisterFailed(format!(
                "unknown registration {id}"
            ))),
        }
    }
}
