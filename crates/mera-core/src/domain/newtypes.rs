//! Small validated value types shared across the Bundle model
//!
//! Mirrors the newtype-with-validated-constructor idiom used for path and
//! identifier types elsewhere in this codebase: construction either succeeds
//! with a value known to satisfy its invariants, or fails with a
//! `CoreError` describing what was wrong.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::CoreError;

// ============================================================================
// TimestampedField<T>
// ============================================================================

/// A value paired with the epoch-millisecond timestamp it was last written.
///
/// This is the unit of last-write-wins comparison used throughout the
/// Bundle: every settings field, the navigation state, and each component
/// progress record is (or contains) a `TimestampedField`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedField<T> {
    pub value: T,
    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
}

impl<T> TimestampedField<T> {
    pub fn new(value: T, last_updated: i64) -> Self {
        Self { value, last_updated }
    }

    /// Returns whichever field was updated more recently, ties favoring `self`.
    pub fn pick_newer(self, other: Self) -> Self
    where
        T: Clone,
    {
        if other.last_updated > self.last_updated {
            other
        } else {
            self
        }
    }

    pub fn is_valid_timestamp(&self) -> bool {
        self.last_updated >= 0
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// A 128-bit random session identifier, rendered as 32 lowercase hex chars.
///
/// Generated once per process by the Save Manager's concurrent-session
/// tripwire (`mera-save`) and compared byte-for-byte against whatever is
/// read back from the Pod's session-protection file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId([u8; 16]);

impl SessionId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for SessionId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl TryFrom<&str> for SessionId {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() != 32 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidSessionId(value.to_string()));
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let hex_pair = &value[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(hex_pair, 16)
                .map_err(|_| CoreError::InvalidSessionId(value.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Which Storage Bridge namespace a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sink {
    Local,
    Pod,
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Local => write!(f, "local"),
            Sink::Pod => write!(f, "pod"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamped_field_pick_newer_ties_favor_self() {
        let a = TimestampedField::new("a", 100);
        let b = TimestampedField::new("b", 100);
        assert_eq!(a.pick_newer(b).value, "a");
    }

    #[test]
    fn test_timestamped_field_pick_newer_strictly_greater() {
        let a = TimestampedField::new("a", 100);
        let b = TimestampedField::new("b", 101);
        assert_eq!(a.pick_newer(b).value, "b");
    }

    #[test]
    fn test_timestamped_field_invalid_negative() {
        let f = TimestampedField::new(1u32, -1);
        assert!(!f.is_valid_timestamp());
    }

    #[test]
    fn test_session_id_round_trip() {
        let bytes = [0xabu8; 16];
        let id = SessionId::from_bytes(bytes);
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        let parsed = SessionId::try_from(s.as_str()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_session_id_rejects_bad_length() {
        assert!(SessionId::try_from("abcd").is_err());
    }

    #[test]
    fn test_session_id_rejects_non_hex() {
        assert!(SessionId::try_from("z".repeat(32).as_str()).is_err());
    }
}
