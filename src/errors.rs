//! Structured error types for egenskriven
//!
//! Exactly four error kinds cross the core boundary: validation failures,
//! missing entities, commit-time conflicts, and transient I/O failures.
//! Callers dispatch on the kind; the hybrid write path and the live-sync
//! plane each have their own recovery policy for `Transient`.

use thiserror::Error;

/// All errors surfaced by the core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input violates a stated precondition. Surfaced verbatim, never retried.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A write observed an invariant violation at commit time.
    /// The core re-reads and retries before surfacing this.
    #[error("conflict on {collection}/{id}: {reason}")]
    Conflict {
        collection: String,
        id: String,
        reason: String,
    },

    /// I/O or store failure that is not semantically a conflict
    #[error("transient failure: {0}")]
    Transient(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn conflict(
        collection: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::Conflict {
            collection: collection.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        CoreError::Transient(message.into())
    }

    /// True for failures the hybrid write path may retry on the other leg
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Transient(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Transient(format!("serialization: {e}"))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Transient(e.to_string())
    }
}

/// Convenience Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
