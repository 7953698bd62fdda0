//! Shared storage error type.
//!
//! Domain crates define their own operation error enums; all of them wrap
//! [`StoreError`] for infrastructure failures so a store outage propagates
//! unchanged instead of being reinterpreted as a business outcome.

use thiserror::Error;

/// A failure inside a backing store.
///
/// These are infrastructure errors (connection lost, serialization broke),
/// never business preconditions. Components surface them verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store rejected or lost the operation.
    #[error("store failure: {0}")]
    Backend(String),

    /// A stored record failed to serialize or deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "store_failure",
            Self::Serialization(_) => "store_serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let error = StoreError::Backend("connection reset".to_string());
        assert_eq!(error.to_string(), "store failure: connection reset");
        assert_eq!(error.reason_code(), "store_failure");
    }
}
