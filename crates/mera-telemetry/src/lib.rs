//! Mera Telemetry - metrics for the progress persistence core
//!
//! Provides `MetricsRegistry`: Prometheus counters and a histogram for save
//! outcomes, cleaner retention deletions, loader recovery scenarios, and
//! tripwire check results. No crash reporting, OS fingerprinting, or network
//! upload - this crate is embedded in a browser host, which owns its own
//! error-reporting surface.

pub mod metrics;

pub use metrics::MetricsRegistry;
