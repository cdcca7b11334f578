//! Progress Integrity (C) and Progress Merger (D).
//!
//! Both are pure functions over `Bundle`/raw JSON; neither touches storage.
//! Callers (the Progress Loader, the Save Orchestrator) own I/O and hand
//! bytes in, validated bundles out.

pub mod enforce;
pub mod merge;
pub mod metrics;

pub use enforce::enforce;
pub use merge::merge;
pub use metrics::{CriticalFailures, EnforcementResult, RecoveryMetrics, WebIdMismatch};
