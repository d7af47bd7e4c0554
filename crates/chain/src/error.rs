use chainwalk_middleware::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("empty start key")]
    EmptyStartKey,
    #[error("no initial keys")]
    NoInitialKeys,
    #[error("field {0} not present in field directory")]
    UnresolvedField(String),
    #[error("record {key} missing mandatory field {field}")]
    MissingField { field: String, key: String },
    #[error("stream closed for {key}: {text}")]
    StreamClosed { key: String, text: String },
    #[error("chain expanded past {cap} distinct keys")]
    KeyCapExceeded { cap: usize },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
