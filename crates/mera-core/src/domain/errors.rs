//! Domain error types
//!
//! This module defines error types specific to domain operations, including
//! contract violations surfaced by adapters and invariant violations that can
//! only originate from a bug in the core itself.

use thiserror::Error;

/// Errors that can occur in core domain operations
///
/// Unlike `StorageError` (which classifies expected, recoverable adapter
/// failures), every variant here is either fatal (the caller must surface
/// it) or indicates a bug upstream of the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A Storage Bridge adapter returned bytes that could not be interpreted
    /// as a UTF-8 string, breaking the bridge's round-trip contract.
    #[error("storage bridge contract violation: {0}")]
    ContractViolation(String),

    /// The Progress Merger produced output that still reports corruption
    /// when fed back through Progress Integrity. This can only happen if
    /// the merge implementation itself is wrong.
    #[error("merger invariant violation: {0}")]
    MergerInvariantViolation(String),

    /// A backup filename did not match the expected grammar.
    #[error("invalid backup filename: {0}")]
    InvalidFilename(String),

    /// A session id string was not 32 lowercase hex characters.
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    /// Generic validation failure raised while constructing a domain value.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::ContractViolation("non-utf8 bytes from pod".to_string());
        assert_eq!(
            err.to_string(),
            "storage bridge contract violation: non-utf8 bytes from pod"
        );
    }

    #[test]
    fn test_error_equality() {
        let a = CoreError::InvalidFilename("bad".to_string());
        let b = CoreError::InvalidFilename("bad".to_string());
        let c = CoreError::InvalidFilename("other".to_string());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
