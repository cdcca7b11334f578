//! Storage Bridge port (driven/secondary port)
//!
//! This module defines the interface every subsystem in this crate programs
//! against for durable storage. It covers both sinks the system writes to -
//! the per-user remote document store ("Pod") and the browser-local key/value
//! store ("Local") - behind one trait, since both expose an identical
//! save/load/delete/list(glob) contract.
//!
//! ## Design Notes
//!
//! - Errors classify into five kinds (`StorageErrorKind`) because the core
//!   branches on error class (see the error-handling taxonomy): an auth
//!   failure disqualifies a scored backup, a not-found is treated as
//!   absence, a network failure is retried next tick.
//! - `glob` supports only the `*` wildcard; implementations are not expected
//!   to support full shell globbing.
//! - Bytes must round-trip byte-exact: whatever UTF-8 string is saved must
//!   come back identical on load. The orchestrator's verification step
//!   relies on this via strict string equality, not semantic equality.
//! - No ordering or atomicity is assumed across calls; two concurrent
//!   writers to the same key race freely.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Sink;

/// Classification of a Storage Bridge failure.
///
/// This mirrors the five-way taxonomy the error-handling design assigns to
/// bridge failures, so callers can match on `kind()` rather than parsing
/// message strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The caller's credentials were rejected or have expired.
    #[error("storage auth error on {sink} at {key}: {message}")]
    Auth {
        sink: Sink,
        key: String,
        message: String,
    },

    /// A transient network failure occurred; retrying later may succeed.
    #[error("storage network error on {sink} at {key}: {message}")]
    Network {
        sink: Sink,
        key: String,
        message: String,
    },

    /// The requested key does not exist.
    #[error("storage not found on {sink} at {key}")]
    NotFound { sink: Sink, key: String },

    /// The underlying storage medium itself failed (disk full, quota, I/O).
    #[error("storage error on {sink} at {key}: {message}")]
    Storage {
        sink: Sink,
        key: String,
        message: String,
    },

    /// The caller passed a key or payload the bridge rejects outright.
    #[error("storage validation error on {sink} at {key}: {message}")]
    Validation {
        sink: Sink,
        key: String,
        message: String,
    },
}

impl StorageError {
    pub fn sink(&self) -> Sink {
        match self {
            StorageError::Auth { sink, .. }
            | StorageError::Network { sink, .. }
            | StorageError::NotFound { sink, .. }
            | StorageError::Storage { sink, .. }
            | StorageError::Validation { sink, .. } => *sink,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Port trait for durable key/value storage on either sink.
///
/// ## Implementation Notes
///
/// - All keys are flat filenames (no directory nesting) per the backup
///   filename grammar.
/// - `list` returns keys matching a `*`-glob pattern, in unspecified order;
///   callers sort the result themselves (newest-first by embedded
///   timestamp) once parsed into `BackupFilename`s.
/// - Implementations should not assume a single caller: the Pod namespace
///   in particular can be written by another device's process concurrently.
#[async_trait]
pub trait StorageBridge: Send + Sync {
    /// Writes `contents` to `key` in `sink`, creating or replacing it.
    async fn save(&self, sink: Sink, key: &str, contents: String) -> Result<(), StorageError>;

    /// Reads the contents of `key` in `sink`.
    ///
    /// Returns `StorageError::NotFound` if the key does not exist.
    async fn load(&self, sink: Sink, key: &str) -> Result<String, StorageError>;

    /// Deletes `key` from `sink`.
    ///
    /// Deleting a key that does not exist is not an error.
    async fn delete(&self, sink: Sink, key: &str) -> Result<(), StorageError>;

    /// Lists keys in `sink` matching `glob` (supporting `*` only).
    async fn list(&self, sink: Sink, glob: &str) -> Result<Vec<String>, StorageError>;
}
