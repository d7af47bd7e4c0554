use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("register failed: {0}")]
    RegisterFailed(String),
    #[error("unregister failed: {0}")]
    UnregisterFailed(String),
    #[error("transport closed: {0}")]
    Closed(String),
}
