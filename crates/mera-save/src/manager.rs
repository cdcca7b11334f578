//! Save Manager (H)
//!
//! A single-threaded cooperative poller, structurally the direct analog of
//! `SyncScheduler::run`: a `tokio::time::interval` drives a loop, and a
//! non-blocking setter (`queue_save`, standing in for the teacher's
//! `enqueue`) is the only way another task feeds it work. Where the
//! teacher debounces filesystem events before deciding whether to sync,
//! this poller checks `has_changed`/`last_outcome` before deciding whether
//! to save.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mera_core::config::Config;
use mera_core::ports::{Clock, StorageBridge};
use mera_telemetry::MetricsRegistry;

use crate::notifier::{CriticalReason, SaveNotifier};
use crate::orchestrator::{orchestrate, SaveOutcome};
use crate::tripwire::{SessionTripwire, TripwireResult};

struct ManagerState {
    save_in_progress: bool,
    last_outcome: SaveOutcome,
    queued_json: Option<String>,
    has_changed: bool,
}

impl Default for ManagerState {
    fn default() -> Self {
        Self {
            save_in_progress: false,
            last_outcome: SaveOutcome::BothSucceeded,
            queued_json: None,
            has_changed: false,
        }
    }
}

/// The singleton cooperative save poller for one process lifetime.
pub struct SaveManager {
    bridge: Arc<dyn StorageBridge>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn SaveNotifier>,
    config: Config,
    state: Mutex<ManagerState>,
    tripwire: SessionTripwire,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SaveManager {
    pub fn new(bridge: Arc<dyn StorageBridge>, clock: Arc<dyn Clock>, notifier: Arc<dyn SaveNotifier>, config: Config) -> Self {
        Self {
            bridge,
            clock,
            notifier,
            config,
            state: Mutex::new(ManagerState::default()),
            tripwire: SessionTripwire::new(),
            metrics: None,
        }
    }

    /// Attaches a Prometheus metrics registry; save outcomes and tripwire
    /// checks are recorded against it from then on.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Queues `json` for the next poll tick. Non-blocking: never awaits,
    /// never contends with an in-progress save beyond a brief mutex lock.
    pub fn queue_save(&self, json: String, has_changed: bool) {
        let mut state = self.state.lock().unwrap();
        state.queued_json = Some(json);
        state.has_changed |= has_changed;
    }

    /// `true` once the most recent save cycle reached at least the solid
    /// (Pod-confirmed) tier.
    pub fn get_online_status(&self) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.last_outcome, SaveOutcome::BothSucceeded | SaveOutcome::OnlySolidSucceeded)
    }

    /// Runs one poll tick (§4.3 steps 1-8).
    async fn tick(&self) {
        let (json, should_trigger) = {
            let state = self.state.lock().unwrap();
            if state.queued_json.is_none() || state.save_in_progress {
                return;
            }
            let should_trigger =
                state.has_changed || matches!(state.last_outcome, SaveOutcome::BothFailed | SaveOutcome::OnlyLocalSucceeded);
            (state.queued_json.clone(), should_trigger)
        };

        if !should_trigger {
            return;
        }
        let json = json.expect("checked Some above");

        {
            let mut state = self.state.lock().unwrap();
            state.save_in_progress = true;
            state.has_changed = false;
        }

        let ts = self.clock.now_ms();
        let tripwire_result = self.tripwire.check(self.bridge.as_ref(), &self.config.session_tripwire).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_tripwire_check(&tripwire_result.to_string());
        }

        match tripwire_result {
            TripwireResult::ConcurrentSessionDetected | TripwireResult::InitializationFailed => {
                let reason = if tripwire_result == TripwireResult::ConcurrentSessionDetected {
                    CriticalReason::ConcurrentSessionDetected
                } else {
                    CriticalReason::InitializationFailed
                };
                self.notifier.on_critical_error(reason).await;
                if let Some(metrics) = &self.metrics {
                    metrics.record_save_outcome(&SaveOutcome::BothFailed.to_string());
                }
                let mut state = self.state.lock().unwrap();
                state.last_outcome = SaveOutcome::BothFailed;
                state.save_in_progress = false;
                return;
            }
            TripwireResult::Passed | TripwireResult::NetworkError => {}
        }

        let allow_pod = tripwire_result == TripwireResult::Passed;
        let schema_version = (
            self.config.schema_version.major,
            self.config.schema_version.minor,
            self.config.schema_version.patch,
        );
        // Run the orchestrator on its own task so a panic inside it (a bug,
        // not an expected outcome) surfaces as a `JoinError` instead of
        // taking this poll loop down with it.
        let bridge = self.bridge.clone();
        let bundle_json = json.clone();
        let outcome = match tokio::spawn(async move { orchestrate(bridge, schema_version, &bundle_json, ts, allow_pod).await }).await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::error!(error = %join_err, "save orchestrator panicked");
                self.notifier.on_critical_error(CriticalReason::OrchestratorPanicked).await;
                if let Some(metrics) = &self.metrics {
                    metrics.record_save_outcome(&SaveOutcome::BothFailed.to_string());
                }
                let mut state = self.state.lock().unwrap();
                state.last_outcome = SaveOutcome::BothFailed;
                state.save_in_progress = false;
                return;
            }
        };

        if outcome == SaveOutcome::OnlySolidSucceeded {
            tracing::info!("degraded offline mode: local save failed, Pod save succeeded");
        }
        if let Some(metrics) = &self.metrics {
            let elapsed_secs = (self.clock.now_ms() - ts).max(0) as f64 / 1000.0;
            metrics.record_save_outcome(&outcome.to_string());
            metrics.observe_save_duration(&outcome.to_string(), elapsed_secs);
        }

        let mut state = self.state.lock().unwrap();
        state.last_outcome = outcome;
        state.save_in_progress = false;
    }

    /// Drives the poll loop forever at `config.save_manager.poll_interval_ms`.
    pub async fn run(&self) {
        let mut poll_timer = tokio::time::interval(Duration::from_millis(self.config.save_manager.poll_interval_ms));
        loop {
            poll_timer.tick().await;
            self.tick().await;
        }
    }
}
