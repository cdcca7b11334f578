//! Concurrent-session tripwire (§4.3.1)
//!
//! Does not prevent simultaneous writers; guarantees the loser of any race
//! eventually observes `ConcurrentSessionDetected` on a later tick and
//! stops advancing the Pod state. One instance lives for the lifetime of
//! the process, holding the session id it picked on its first check.

use std::sync::Mutex;
use std::time::Duration;

use mera_core::config::SessionTripwireConfig;
use mera_core::domain::{SessionId, Sink};
use mera_core::ports::StorageBridge;
use serde::{Deserialize, Serialize};

/// The path every process checks against before writing to Pod.
pub const SESSION_PROTECTION_KEY: &str = "mera.session-protection.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripwireResult {
    Passed,
    ConcurrentSessionDetected,
    InitializationFailed,
    NetworkError,
}

impl std::fmt::Display for TripwireResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TripwireResult::Passed => "passed",
            TripwireResult::ConcurrentSessionDetected => "concurrent_session_detected",
            TripwireResult::InitializationFailed => "initialization_failed",
            TripwireResult::NetworkError => "network_error",
        };
        write!(f, "{s}")
    }
}

#[derive(Serialize, Deserialize)]
struct SessionProtectionFile {
    #[serde(rename = "sessionId")]
    session_id: SessionId,
}

/// Generates, writes, and thereafter continuously reconfirms one session id
/// against the Pod's session-protection file.
pub struct SessionTripwire {
    session_id: Mutex<Option<SessionId>>,
}

impl Default for SessionTripwire {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTripwire {
    pub fn new() -> Self {
        Self {
            session_id: Mutex::new(None),
        }
    }

    fn generate_session_id() -> SessionId {
        let mut bytes = [0u8; 16];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        SessionId::from_bytes(bytes)
    }

    async fn read_back(bridge: &dyn StorageBridge) -> Option<SessionId> {
        let raw = bridge.load(Sink::Pod, SESSION_PROTECTION_KEY).await.ok()?;
        let parsed: SessionProtectionFile = serde_json::from_str(&raw).ok()?;
        Some(parsed.session_id)
    }

    async fn first_check(&self, bridge: &dyn StorageBridge, config: &SessionTripwireConfig) -> TripwireResult {
        let ours = Self::generate_session_id();
        let payload = serde_json::to_string(&SessionProtectionFile { session_id: ours }).expect("SessionProtectionFile always serializes");

        let mut write_ok = false;
        let attempts = config.backoff_schedule_ms.len().max(1);
        for attempt in 0..attempts {
            if bridge.save(Sink::Pod, SESSION_PROTECTION_KEY, payload.clone()).await.is_ok() {
                write_ok = true;
                break;
            }
            if let Some(delay) = config.backoff_schedule_ms.get(attempt) {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
            }
        }
        if !write_ok {
            return TripwireResult::InitializationFailed;
        }

        tokio::time::sleep(Duration::from_millis(config.read_back_delay_ms)).await;

        match Self::read_back(bridge).await {
            None => TripwireResult::InitializationFailed,
            Some(found) if found == ours => {
                *self.session_id.lock().unwrap() = Some(ours);
                TripwireResult::Passed
            }
            Some(_) => TripwireResult::ConcurrentSessionDetected,
        }
    }

    fn subsequent_check(ours: SessionId, found: Option<SessionId>) -> TripwireResult {
        match found {
            None => TripwireResult::NetworkError,
            Some(found) if found == ours => TripwireResult::Passed,
            Some(_) => TripwireResult::ConcurrentSessionDetected,
        }
    }

    /// Runs one tripwire check for the current poll tick.
    pub async fn check(&self, bridge: &dyn StorageBridge, config: &SessionTripwireConfig) -> TripwireResult {
        let existing = *self.session_id.lock().unwrap();
        match existing {
            None => self.first_check(bridge, config).await,
            Some(ours) => {
                let found = Self::read_back(bridge).await;
                Self::subsequent_check(ours, found)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mera_core::testing::InMemoryStorageBridge;

    fn fast_config() -> SessionTripwireConfig {
        SessionTripwireConfig {
            backoff_schedule_ms: vec![1, 1, 1, 1, 1],
            read_back_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_first_check_passes_when_file_is_ours() {
        let bridge = InMemoryStorageBridge::new();
        let tripwire = SessionTripwire::new();
        let result = tripwire.check(&bridge, &fast_config()).await;
        assert_eq!(result, TripwireResult::Passed);
    }

    #[tokio::test]
    async fn test_concurrent_first_checks_exactly_one_passes() {
        let bridge = InMemoryStorageBridge::new();
        let a = SessionTripwire::new();
        let b = SessionTripwire::new();
        let (result_a, result_b) = tokio::join!(a.check(&bridge, &fast_config()), b.check(&bridge, &fast_config()));
        let results = [result_a, result_b];
        assert_eq!(results.iter().filter(|r| **r == TripwireResult::Passed).count(), 1);
        assert_eq!(
            results.iter().filter(|r| **r == TripwireResult::ConcurrentSessionDetected).count(),
            1
        );
    }

    struct AlwaysFailBridge;

    #[async_trait::async_trait]
    impl StorageBridge for AlwaysFailBridge {
        async fn save(&self, sink: Sink, key: &str, _contents: String) -> Result<(), mera_core::ports::StorageError> {
            Err(mera_core::ports::StorageError::Storage {
                sink,
                key: key.to_string(),
                message: "always fails".to_string(),
            })
        }
        async fn load(&self, sink: Sink, key: &str) -> Result<String, mera_core::ports::StorageError> {
            Err(mera_core::ports::StorageError::NotFound {
                sink,
                key: key.to_string(),
            })
        }
        async fn delete(&self, _sink: Sink, _key: &str) -> Result<(), mera_core::ports::StorageError> {
            Ok(())
        }
        async fn list(&self, _sink: Sink, _glob: &str) -> Result<Vec<String>, mera_core::ports::StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_first_check_initialization_failed_when_writes_never_succeed() {
        let bridge = AlwaysFailBridge;
        let tripwire = SessionTripwire::new();
        let result = tripwire.check(&bridge, &fast_config()).await;
        assert_eq!(result, TripwireResult::InitializationFailed);
    }

    #[tokio::test]
    async fn test_subsequent_check_passes_when_unchanged() {
        let bridge = InMemoryStorageBridge::new();
        let tripwire = SessionTripwire::new();
        assert_eq!(tripwire.check(&bridge, &fast_config()).await, TripwireResult::Passed);
        assert_eq!(tripwire.check(&bridge, &fast_config()).await, TripwireResult::Passed);
    }

    #[tokio::test]
    async fn test_subsequent_check_network_error_when_file_disappears() {
        let bridge = InMemoryStorageBridge::new();
        let tripwire = SessionTripwire::new();
        assert_eq!(tripwire.check(&bridge, &fast_config()).await, TripwireResult::Passed);
        bridge.delete(Sink::Pod, SESSION_PROTECTION_KEY).await.unwrap();
        assert_eq!(tripwire.check(&bridge, &fast_config()).await, TripwireResult::NetworkError);
    }

    #[tokio::test]
    async fn test_subsequent_check_detects_takeover() {
        let bridge = InMemoryStorageBridge::new();
        let tripwire = SessionTripwire::new();
        assert_eq!(tripwire.check(&bridge, &fast_config()).await, TripwireResult::Passed);

        let intruder = SessionProtectionFile {
            session_id: SessionTripwire::generate_session_id(),
        };
        bridge
            .save(Sink::Pod, SESSION_PROTECTION_KEY, serde_json::to_string(&intruder).unwrap())
            .await
            .unwrap();

        assert_eq!(tripwire.check(&bridge, &fast_config()).await, TripwireResult::ConcurrentSessionDetected);
    }
}
