use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::record::RecordFields;

/// Opaque identifier for one record on the feed (an instrument or page name).
///
/// Keys are trimmed at the boundary: `parse` returns `None` for input that
/// trims to nothing, so an empty or whitespace-only continuation field is
/// indistinguishable from an absent one everywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainKey(String);

impl ChainKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle naming one open registration with a `RecordSource`.
pub type RegistrationId = u64;

/// Receiving side of a registration: the transport invokes `deliver` once
/// per response record. Implementations must tolerate late deliveries that
/// race with `unregister`.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn deliver(&self, key: ChainKey, record: Arc<dyn RecordFields>);
}

/// Transport abstraction for record request/response.
///
/// `register` expresses interest in a key; responses arrive asynchronously
/// on the sink. `unregister` cancels, but does not guarantee that an
/// already in-flight delivery is suppressed.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn register(
        &self,
        key: &ChainKey,
        sink: Arc<dyn RecordSink>,
    ) -> Result<RegistrationId, TransportError>;

    async fn unregister(&self, id: RegistrationId) -> Result<(), TransportError>;
}
