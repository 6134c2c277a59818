//! Error taxonomy
//!
//! Every rejected request surfaces one of these kinds as a single-line
//! `<kind>: <detail>` message. `Duplicate` is deliberately absent:
//! a dedup hit is a successful `skipped` ingest, not an error.

use thiserror::Error;

/// Top-level engine error, composed from the lower layers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Validation failure: empty input, bad enum value, budget too small.
    #[error("bad_request: {0}")]
    BadRequest(String),

    /// Id lookup miss.
    #[error("not_found: {0}")]
    NotFound(String),

    /// Underlying storage failure; the transaction was rejected.
    #[error("store_error: {0}")]
    Store(String),

    /// Search or generator deadline exceeded.
    #[error("timeout_error: {0}")]
    Timeout(String),

    /// The external generator failed (scribe or chat only).
    #[error("generator_error: {0}")]
    Generator(String),

    /// Disk full or store corrupted; the process must refuse further writes.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl EngineError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// `true` for kinds a caller can usefully retry (timeouts, generator
    /// hiccups) as opposed to kinds that mean the request itself was wrong.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Generator(_))
    }
}

impl From<crate::store::StoreError> for EngineError {
    fn from(e: crate::store::StoreError) -> Self {
        match e {
            crate::store::StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Store(other.to_string()),
        }
    }
}

impl From<crate::atomizer::AtomizerError> for EngineError {
    fn from(e: crate::atomizer::AtomizerError) -> Self {
        EngineError::BadRequest(e.to_string())
    }
}

impl From<crate::scribe::ScribeError> for EngineError {
    fn from(e: crate::scribe::ScribeError) -> Self {
        match e {
            crate::scribe::ScribeError::Store(store_err) => EngineError::from(store_err),
        }
    }
}

impl From<crate::ingest::IngestError> for EngineError {
    fn from(e: crate::ingest::IngestError) -> Self {
        match e {
            crate::ingest::IngestError::Store(store_err) => EngineError::from(store_err),
            other => EngineError::BadRequest(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
