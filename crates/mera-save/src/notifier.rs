//! Save Notifier port
//!
//! The Save Manager's only way of surfacing a save failure severe enough
//! to interrupt the user - at most one modal per process lifetime, per §7.
//! Fire-and-forget, like the teacher's notification port: the manager does
//! not wait on user acknowledgement before continuing to poll.

use async_trait::async_trait;

/// Why the Save Manager raised a critical error this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalReason {
    ConcurrentSessionDetected,
    InitializationFailed,
    OrchestratorPanicked,
}

impl std::fmt::Display for CriticalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CriticalReason::ConcurrentSessionDetected => "concurrent_session_detected",
            CriticalReason::InitializationFailed => "initialization_failed",
            CriticalReason::OrchestratorPanicked => "orchestrator_panicked",
        };
        write!(f, "{s}")
    }
}

/// Port the Save Manager uses to surface critical, process-halting errors
/// to the embedding application's UI layer.
#[async_trait]
pub trait SaveNotifier: Send + Sync {
    async fn on_critical_error(&self, reason: CriticalReason);
}

/// A notifier that only logs, for embedding applications that have no UI
/// collaborator wired up yet (and for tests).
pub struct LoggingSaveNotifier;

#[async_trait]
impl SaveNotifier for LoggingSaveNotifier {
    async fn on_critical_error(&self, reason: CriticalReason) {
        tracing::error!(reason = %reason, "critical save error");
    }
}
