use bytes::Bytes;
use chainwalk_middleware::ChainKey;

/// One unit of reassembled chain content.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Key of the record this fragment was extracted from.
    pub key: ChainKey,
    pub payload: Bytes,
    /// Auxiliary format flag: the record marked its payload as tabular.
    pub tabular: bool,
}

/// Application-level consumer of a chain.
///
/// Terminal callbacks are exclusive and at-most-once: a run ends in exactly
/// one `on_complete` or one `on_error`, and nothing is delivered afterwards.
/// Callbacks run on the transport's delivery context and must not call back
/// into the fetcher.
pub trait ChainListener: Send + Sync {
    fn on_fragment(&self, fragment: &Fragment);
    fn on_complete(&self);
    fn on_error(&self, message: &str);
}
