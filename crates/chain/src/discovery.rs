use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use chainwalk_middleware::{
    ChainKey, RecordFields, RecordSink, RecordSource, RegistrationId,
};

use crate::error::ChainError;
use crate::fetcher::Phase;
use crate::listener::{ChainListener, Fragment};
use crate::schema::{DiscoverySchema, FieldDirectory, ResolvedDiscoverySchema};

/// Accumulating chain fetcher: eager fan-out over every known key.
///
/// One fetch is issued immediately for each initial key; every response may
/// reference further keys, each of which is fetched the moment it is first
/// seen. Re-discovering a key is a no-op, which is what makes cyclic
/// reference graphs terminate. The chain completes exactly once, when the
/// pending count drains to zero.
///
/// A member that resolves to a closed/final status drains the pending count
/// without failing the chain; siblings are independent and the fetcher
/// never re-requests anything.
pub struct DiscoveryChainFetcher {
    source: Arc<dyn RecordSource>,
    listener: Option<Arc<dyn ChainListener>>,
    schema: Option<ResolvedDiscoverySchema>,
    self_ref: Weak<DiscoveryChainFetcher>,
    state: Mutex<DiscoveryState>,
}

struct DiscoveryState {
    phase: Phase,
    /// Every key ever seen; grows monotonically, never re-fetched.
    known: HashSet<ChainKey>,
    /// Keys with a registration currently open. `open.len() == pending`
    /// while running.
    open: HashMap<ChainKey, RegistrationId>,
    pending: usize,
    error_text: Option<String>,
}

impl DiscoveryChainFetcher {
    pub async fn start(
        source: Arc<dyn RecordSource>,
        listener: Option<Arc<dyn ChainListener>>,
        directory: &FieldDirectory,
        schema: DiscoverySchema,
        initial_keys: &[&str],
    ) -> Arc<Self> {
        let mut keys = Vec::new();
        for raw in initial_keys {
            if let Some(key) = ChainKey::parse(raw) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        if keys.is_empty() {
            return Self::stillborn(source, listener, ChainError::NoInitialKeys);
        }
        let schema = match schema.resolve(directory) {
            Ok(schema) => schema,
            Err(err) => return Self::stillborn(source, listener, err),
        };

        let fetcher = Arc::new_cyclic(|weak| Self {
            source,
            listener,
            schema: Some(schema),
            self_ref: weak.clone(),
            state: Mutex::new(DiscoveryState {
                phase: Phase::Running,
                known: HashSet::new(),
                open: HashMap::new(),
                pending: 0,
                error_text: None,
            }),
        });

        let mut st = fetcher.state.lock().await;
        for key in keys {
            st.known.insert(key.clone());
            let sink: Arc<dyn RecordSink> = fetcher.clone();
            match fetcher.source.register(&key, sink).await {
                Ok(id) => {
                    st.open.insert(key, id);
                    st.pending += 1;
                }
                Err(err) => {
                    // Construction failure: release whatever was opened,
                    // leave the listener untouched.
                    let err = ChainError::from(err);
                    warn!(key = %key, error = %err, "discovery chain could not start");
                    fetcher.release_all(&mut st).await;
                    st.phase = Phase::Failed;
                    st.error_text = Some(err.to_string());
                    break;
                }
            }
        }
        if st.phase == Phase::Running {
            info!(keys = st.pending, "discovery chain started");
        }
        drop(st);
        fetcher
    }

    fn stillborn(
        source: Arc<dyn RecordSource>,
        listener: Option<Arc<dyn ChainListener>>,
        err: ChainError,
    ) -> Arc<Self> {
        warn!(error = %err, "discovery chain fetcher not started");
        Arc::new_cyclic(|weak| Self {
            source,
            listener,
            schema: None,
            self_ref: weak.clone(),
            state: Mutex::new(DiscoveryState {
                phase: Phase::Failed,
                known: HashSet::new(),
                open: HashMap::new(),
                pending: 0,
                error_text: Some(err.to_string()),
            }),
        })
    }

    /// Cancel the chain: release every open registration and go inert.
    /// Racing deliveries are dropped; no listener notification. Idempotent.
    pub async fn cleanup(&self) {
        let mut st = self.state.lock().await;
        if st.phase.is_terminal() {
            return;
        }
        debug!(open = st.open.len(), "cancelling discovery chain");
        self.release_all(&mut st).await;
        st.phase = Phase::Cancelled;
    }

    pub async fn is_complete(&self) -> bool {
        self.state.lock().await.phase.is_terminal()
    }

    pub async fn is_error(&self) -> bool {
        self.state.lock().await.phase == Phase::Failed
    }

    pub async fn error_text(&self) -> Option<String> {
        self.state.lock().await.error_text.clone()
    }

    /// Distinct keys seen so far (initial and discovered).
    pub async fn known_keys(&self) -> usize {
        self.state.lock().await.known.len()
    }

    async fn release_all(&self, st: &mut DiscoveryState) {
        for (key, reg) in st.open.drain() {
            if let Err(err) = self.source.unregister(reg).await {
                warn!(key = %key, error = %err, "failed to release registration");
            }
        }
        st.pending = 0;
    }

    async fn fail(&self, st: &mut DiscoveryState, err: ChainError) {
        self.release_all(st).await;
        st.phase = Phase::Failed;
        let text = err.to_string();
        warn!(error = %text, keys = st.known.len(), "discovery chain failed");
        st.error_text = Some(text.clone());
        if let Some(listener) = &self.listener {
            listener.on_error(&text);
        }
    }
}

#[async_trait]
impl RecordSink for DiscoveryChainFetcher {
    async fn deliver(&self, key: ChainKey, record: Arc<dyn RecordFields>) {
        let mut st = self.state.lock().await;
        if st.phase.is_terminal() {
            debug!(key = %key, "dropping delivery for terminal fetcher");
            return;
        }
        let Some(reg) = st.open.remove(&key) else {
            debug!(key = %key, "dropping delivery with no open registration");
            return;
        };
        st.pending -= 1;
        if let Err(err) = self.source.unregister(reg).await {
            warn!(key = %key, error = %err, "failed to release registration");
        }
        let Some(schema) = self.schema.as_ref() else {
            return;
        };

        if record.is_final_status() {
            warn!(key = %key, status = %record.status_text(), "chain member closed, continuing without it");
        } else {
            let fragments = schema.read_fragments(record.as_ref());
            let links = schema.read_links(record.as_ref());

            if let Some(listener) = &self.listener {
                for text in fragments {
                    listener.on_fragment(&Fragment {
                        key: key.clone(),
                        payload: Bytes::from(text),
                        tabular: false,
                    });
                }
            }

            for raw in links {
                let Some(next) = ChainKey::parse(&raw) else {
                    continue;
                };
                if st.known.contains(&next) {
                    continue;
                }
                if let Some(cap) = schema.max_keys() {
                    if st.known.len() >= cap {
                        self.fail(&mut st, ChainError::KeyCapExceeded { cap }).await;
                        return;
                    }
                }
                st.known.insert(next.clone());
                let Some(me) = self.self_ref.upgrade() else {
                    return;
                };
                let sink: Arc<dyn RecordSink> = me;
                match self.source.register(&next, sink).await {
                    Ok(id) => {
                        debug!(key = %next, "discovered chain member");
                        st.open.insert(next, id);
                        st.pending += 1;
                    }
                    Err(err) => {
                        self.fail(&mut st, ChainError::from(err)).await;
                        return;
                    }
                }
            }
        }

        if st.pending == 0 {
            st.phase = Phase::Complete;
            info!(keys = st.known.len(), "discovery chain complete");
            if let Some(listener) = &self.listener {
                listener.on_complete();
            }
        }
    }
}
