//! Progress Loader (F) and Escape Hatch (E)
//!
//! Turns the set of backups scattered across two sinks into one bundle the
//! embedding application can hand to its UI, choosing between them with
//! `mera-integrity`'s enforcement and merge logic rather than reinventing
//! conflict resolution here.

pub mod backups;
pub mod escape_hatch;
pub mod loader;
pub mod scenarios;
pub mod scoring;

use std::collections::HashMap;
use std::sync::Arc;

use mera_core::config::Config;
use mera_core::domain::CoreError;
use mera_core::ports::{Clock, CurriculumRegistry, StorageBridge};
use mera_telemetry::MetricsRegistry;

pub use loader::{load, ProgressLoadResult};
pub use scenarios::RecoveryScenario;

/// Runs [`load`] and records the resulting recovery scenario against
/// `metrics`. A thin wrapper so `load` itself stays free of an observability
/// dependency in its core test suite.
pub async fn load_with_metrics(
    bridge: Arc<dyn StorageBridge>,
    clock: Arc<dyn Clock>,
    registry: &dyn CurriculumRegistry,
    parsed_lessons: &HashMap<String, serde_json::Value>,
    web_id: Option<&str>,
    config: &Config,
    metrics: Option<&MetricsRegistry>,
) -> Result<ProgressLoadResult, CoreError> {
    let result = load(bridge, clock, registry, parsed_lessons, web_id, config).await?;
    if let Some(metrics) = metrics {
        metrics.record_recovery_scenario(&result.scenario.to_string());
    }
    Ok(result)
}
