use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use chainwalk_middleware::{
    ChainKey, RecordFields, RecordSink, RecordSource, RegistrationId,
};

use crate::error::ChainError;
use crate::listener::{ChainListener, Fragment};
use crate::schema::{ChainSchema, FieldDirectory, ResolvedChainSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Running,
    Complete,
    Failed,
    Cancelled,
}

impl Phase {
    pub(crate) fn is_terminal(self) -> bool {
        self != Phase::Running
    }
}

/// Sequential chain fetcher: follows one continuation pointer at a time.
///
/// Exactly one transport registration is outstanding while running. Each
/// response either extends the chain (release the old registration, open
/// one for the continuation key) or terminates it; terminal listener
/// notification happens at most once and the fetcher is inert afterwards,
/// dropping any late or duplicate deliveries.
///
/// Construction is fail-fast: an empty start key, a schema the field
/// directory cannot resolve, or a failing first registration leave the
/// returned fetcher terminal with `is_error()` set and the listener
/// untouched. Callers must check `is_error()` after `start`.
pub struct ChainFetcher {
    source: Arc<dyn RecordSource>,
    listener: Option<Arc<dyn ChainListener>>,
    schema: Option<ResolvedChainSchema>,
    self_ref: Weak<ChainFetcher>,
    state: Mutex<FetcherState>,
}

struct FetcherState {
    phase: Phase,
    current: Option<(ChainKey, RegistrationId)>,
    count: u32,
    limit: Option<u32>,
    error_text: Option<String>,
}

impl ChainFetcher {
    pub async fn start(
        source: Arc<dyn RecordSource>,
        listener: Option<Arc<dyn ChainListener>>,
        directory: &FieldDirectory,
        schema: ChainSchema,
        start_key: &str,
        limit: Option<u32>,
    ) -> Arc<Self> {
        let Some(start_key) = ChainKey::parse(start_key) else {
            return Self::stillborn(source, listener, ChainError::EmptyStartKey);
        };
        let schema = match schema.resolve(directory) {
            Ok(schema) => schema,
            Err(err) => return Self::stillborn(source, listener, err),
        };

        let fetcher = Arc::new_cyclic(|weak| Self {
            source,
            listener,
            schema: Some(schema),
            self_ref: weak.clone(),
            state: Mutex::new(FetcherState {
                phase: Phase::Running,
                current: None,
                count: 0,
                limit,
                error_text: None,
            }),
        });

        let mut st = fetcher.state.lock().await;
        let sink: Arc<dyn RecordSink> = fetcher.clone();
        match fetcher.source.register(&start_key, sink).await {
            Ok(id) => {
                info!(key = %start_key, ?limit, "chain fetch started");
                st.current = Some((start_key, id));
            }
            Err(err) => {
                // No response was ever in flight, so this stays a
                // construction failure: terminal, listener untouched.
                let err = ChainError::from(err);
                warn!(key = %start_key, error = %err, "chain fetch could not start");
                st.phase = Phase::Failed;
                st.error_text = Some(err.to_string());
            }
        }
        drop(st);
        fetcher
    }

    fn stillborn(
        source: Arc<dyn RecordSource>,
        listener: Option<Arc<dyn ChainListener>>,
        err: ChainError,
    ) -> Arc<Self> {
        warn!(error = %err, "chain fetcher not started");
        Arc::new_cyclic(|weak| Self {
            source,
            listener,
            schema: None,
            self_ref: weak.clone(),
            state: Mutex::new(FetcherState {
                phase: Phase::Failed,
                current: None,
                count: 0,
                limit: None,
                error_text: Some(err.to_string()),
            }),
        })
    }

    /// Cancel the chain: release the outstanding registration and go inert.
    /// Deliveries racing with the cancellation are dropped. No listener
    /// notification; the caller initiated the shutdown. Idempotent.
    pub async fn cleanup(&self) {
        let mut st = self.state.lock().await;
        if st.phase.is_terminal() {
            return;
        }
        if let Some((key, reg)) = st.current.take() {
            debug!(key = %key, "cancelling chain fetch");
            self.release(reg).await;
        }
        st.phase = Phase::Cancelled;
    }

    /// True once the fetcher reached any terminal state.
    pub async fn is_complete(&self) -> bool {
        self.state.lock().await.phase.is_terminal()
    }

    pub async fn is_error(&self) -> bool {
        self.state.lock().await.phase == Phase::Failed
    }

    pub async fn error_text(&self) -> Option<String> {
        self.state.lock().await.error_text.clone()
    }

    /// Records successfully processed so far.
    pub async fn count(&self) -> u32 {
        self.state.lock().await.count
    }

    async fn release(&self, reg: RegistrationId) {
        if let Err(err) = self.source.unregister(reg).await {
            warn!(error = %err, "failed to release registration");
        }
    }

    fn fail_locked(&self, st: &mut FetcherState, err: ChainError) {
        st.current = None;
        st.phase = Phase::Failed;
        let text = err.to_string();
        warn!(error = %text, records = st.count, "chain fetch failed");
        st.error_text = Some(text.clone());
        if let Some(listener) = &self.listener {
            listener.on_error(&text);
        }
    }

    async fn fail(&self, st: &mut FetcherState, reg: RegistrationId, err: ChainError) {
        self.release(reg).await;
        self.fail_locked(st, err);
    }

    async fn finish(&self, st: &mut FetcherState, reg: RegistrationId, reason: &str) {
        self.release(reg).await;
        st.current = None;
        st.phase = Phase::Complete;
        info!(records = st.count, reason, "chain fetch complete");
        if let Some(listener) = &self.listener {
            listener.on_complete();
        }
    }

    async fn advance(&self, st: &mut FetcherState, reg: RegistrationId, next: ChainKey) {
        // Release before registering: never two registrations outstanding.
        self.release(reg).await;
        st.current = None;
        let Some(me) = self.self_ref.upgrade() else {
            return;
        };
        let sink: Arc<dyn RecordSink> = me;
        match self.source.register(&next, sink).await {
            Ok(id) => {
                debug!(key = %next, records = st.count, "following chain");
                st.current = Some((next, id));
            }
            Err(err) => self.fail_locked(st, ChainError::from(err)),
        }
    }
}

#[async_trait]
impl RecordSink for ChainFetcher {
    async fn deliver(&self, key: ChainKey, record: Arc<dyn RecordFields>) {
        let mut st = self.state.lock().await;
        if st.phase.is_terminal() {
            debug!(key = %key, "dropping delivery for terminal fetcher");
            return;
        }
        let reg = match &st.current {
            Some((current, reg)) if *current == key => *reg,
            _ => {
                debug!(key = %key, "dropping delivery for stale key");
                return;
            }
        };
        let Some(schema) = self.schema.as_ref() else {
            return;
        };

        if record.is_final_status() {
            let err = ChainError::StreamClosed {
                key: key.to_string(),
                text: record.status_text(),
            };
            self.fail(&mut st, reg, err).await;
            return;
        }

        let Some(payload) = schema.read_payload(record.as_ref()) else {
            let err = ChainError::MissingField {
                field: schema.payload_field().to_string(),
                key: key.to_string(),
            };
            self.fail(&mut st, reg, err).await;
            return;
        };

        st.count += 1;
        let continuation = schema.read_continuation(record.as_ref());
        let tabular = schema.read_tabular(record.as_ref());

        if let Some(listener) = &self.listener {
            listener.on_fragment(&Fragment {
                key,
                payload,
                tabular,
            });
        }

        let limit_reached = st.limit.is_some_and(|limit| st.count >= limit);
        if limit_reached {
            self.finish(&mut st, reg, "record limit reached").await;
        } else if let Some(next) = continuation {
            self.advance(&mut st, reg, next).await;
        } else {
            self.finish(&mut st, reg, "end of chain").await;
        }
    }
}
