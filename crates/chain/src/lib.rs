//! chainwalk-chain: segment-chain reassembly
//!
//! Fetches a linked sequence of remote records (a "chain") over an injected
//! record transport, delivering reassembled fragments to a listener. Two
//! variants: [`ChainFetcher`] follows one continuation pointer at a time;
//! [`DiscoveryChainFetcher`] fans out eagerly over every key it discovers
//! and completes when nothing is left pending.

pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod listener;
pub mod schema;

pub use discovery::DiscoveryChainFetcher;
pub use error::ChainError;
pub use fetcher::ChainFetcher;
pub use listener::{ChainListener, Fragment};
pub use schema::{
    ChainSchema, DiscoverySchema, FieldDirectory, PayloadField, ResolvedChainSchema,
    ResolvedDiscoverySchema,
};
