//! chainwalk-middleware: pluggable record transport abstractions
//!
//! Provides trait-based abstractions for the record request/response
//! transport and for typed field access on decoded records, with an
//! in-memory scripted implementation for tests and demos.

pub mod error;
pub mod memory;
pub mod record;
pub mod transport;

pub use error::TransportError;
pub use memory::{MapRecord, MemoryFeed};
pub use record::RecordFields;
pub use transport::{ChainKey, RecordSink, RecordSource, RegistrationId};
