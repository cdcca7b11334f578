//! Prometheus metrics registry for the Mera progress core
//!
//! Typed, labeled counters and a histogram for the observable events of the
//! save/load pipeline: save outcomes, cleaner retention deletions, recovery
//! scenario classifications, and tripwire check results.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: save cycles by outcome (both_succeeded, only_local_succeeded, ...)
    pub save_outcomes_total: IntCounterVec,
    /// Counter: backups deleted by the cleaner, by (sink, bracket)
    pub cleaner_deletions_total: IntCounterVec,
    /// Counter: loader recovery scenario classifications
    pub recovery_scenarios_total: IntCounterVec,
    /// Counter: concurrent-session tripwire checks by result
    pub tripwire_checks_total: IntCounterVec,
    /// Histogram: save cycle duration in seconds, by outcome
    pub save_duration_seconds: HistogramVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("mera".to_string()), None)?;

        let save_outcomes_total = IntCounterVec::new(
            Opts::new("save_outcomes_total", "Total save cycles by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(save_outcomes_total.clone()))?;

        let cleaner_deletions_total = IntCounterVec::new(
            Opts::new("cleaner_deletions_total", "Total backups deleted by the save cleaner"),
            &["sink", "bracket"],
        )?;
        registry.register(Box::new(cleaner_deletions_total.clone()))?;

        let recovery_scenarios_total = IntCounterVec::new(
            Opts::new("recovery_scenarios_total", "Total progress loads by recovery scenario"),
            &["scenario"],
        )?;
        registry.register(Box::new(recovery_scenarios_total.clone()))?;

        let tripwire_checks_total = IntCounterVec::new(
            Opts::new("tripwire_checks_total", "Total concurrent-session tripwire checks by result"),
            &["result"],
        )?;
        registry.register(Box::new(tripwire_checks_total.clone()))?;

        let save_duration_seconds = HistogramVec::new(
            HistogramOpts::new("save_duration_seconds", "Save cycle duration in seconds")
                .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, f64::INFINITY]),
            &["outcome"],
        )?;
        registry.register(Box::new(save_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            save_outcomes_total,
            cleaner_deletions_total,
            recovery_scenarios_total,
            tripwire_checks_total,
            save_duration_seconds,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record a completed save cycle's outcome.
    pub fn record_save_outcome(&self, outcome: &str) {
        self.save_outcomes_total.with_label_values(&[outcome]).inc();
    }

    /// Record one backup deleted by the cleaner.
    pub fn record_cleaner_deletion(&self, sink: &str, bracket: &str) {
        self.cleaner_deletions_total.with_label_values(&[sink, bracket]).inc();
    }

    /// Record a progress load's recovery scenario classification.
    pub fn record_recovery_scenario(&self, scenario: &str) {
        self.recovery_scenarios_total.with_label_values(&[scenario]).inc();
    }

    /// Record a concurrent-session tripwire check result.
    pub fn record_tripwire_check(&self, result: &str) {
        self.tripwire_checks_total.with_label_values(&[result]).inc();
    }

    /// Observe how long a save cycle took to complete.
    pub fn observe_save_duration(&self, outcome: &str, duration_secs: f64) {
        self.save_duration_seconds.with_label_values(&[outcome]).observe(duration_secs);
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
