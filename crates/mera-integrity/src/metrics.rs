//! Recovery metrics and critical failures produced by `enforce`
//!
//! Kept as one small module of plain data structs, all `Default`, so the
//! fully-defaulted fallback path (raw bytes don't even parse) can build an
//! `EnforcementResult` by calling `Default::default()` and setting one field.

use mera_core::domain::Bundle;

/// A fatal mismatch between the web id embedded in a bundle and the web id
/// the caller expected, recorded rather than silently swallowed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WebIdMismatch {
    pub expected: String,
    pub found: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CriticalFailures {
    pub web_id_mismatch: Option<WebIdMismatch>,
}

impl CriticalFailures {
    pub fn is_empty(&self) -> bool {
        self.web_id_mismatch.is_none()
    }
}

/// Everything `enforce` discovered while sanitizing one bundle: how much
/// was defaulted, how much was dropped, and whether counter corruption was
/// detected. The Progress Loader's scoring formula (§4.7.1) is a pure
/// function of this struct.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecoveryMetrics {
    pub lessons_lost_to_corruption: u64,
    pub domains_lost_to_corruption: u64,
    pub lessons_dropped_count: u64,
    pub domains_dropped_count: u64,
    pub lessons_dropped_ratio: f64,
    pub domains_dropped_ratio: f64,
    pub settings_defaulted_count: u32,
    pub settings_defaulted_ratio: f64,
    pub navigation_defaulted: bool,
    pub components_defaulted_count: usize,
    pub components_retained_count: usize,
}

impl RecoveryMetrics {
    pub fn corruption_detected(&self) -> bool {
        self.lessons_lost_to_corruption > 0 || self.domains_lost_to_corruption > 0
    }

    pub fn items_dropped_count(&self) -> u64 {
        self.lessons_dropped_count + self.domains_dropped_count
    }
}

/// The outcome of running raw bytes, or a previously-sanitized bundle,
/// through Progress Integrity.
#[derive(Debug, Clone, PartialEq)]
pub struct EnforcementResult {
    pub bundle: Bundle,
    pub perfectly_valid_input: bool,
    pub recovery_metrics: RecoveryMetrics,
    pub critical_failures: CriticalFailures,
}

impl EnforcementResult {
    pub fn fully_defaulted(web_id_mismatch: WebIdMismatch) -> Self {
        Self {
            bundle: Bundle::defaulted_for(""),
            perfectly_valid_input: false,
            recovery_metrics: RecoveryMetrics::default(),
            critical_failures: CriticalFailures {
                web_id_mismatch: Some(web_id_mismatch),
            },
        }
    }
}
