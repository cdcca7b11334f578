//! Pure scoring formula (§4.7.1)
//!
//! Kept free of any port dependency so the formula itself, and its boundary
//! behavior around the `settings_defaulted_ratio > 0` baseline bonus, can be
//! unit-tested without an async loader or a `StorageBridge` double.

use mera_core::config::LoaderConfig;
use mera_integrity::RecoveryMetrics;

/// Lower is better. A perfectly valid backup never reaches this function -
/// the caller short-circuits to `0` before calling it.
pub fn score(metrics: &RecoveryMetrics, index_from_newest: usize, config: &LoaderConfig) -> u32 {
    let lost_to_corruption =
        metrics.lessons_lost_to_corruption + metrics.domains_lost_to_corruption;
    let dropped = metrics.items_dropped_count();

    let mut total = lost_to_corruption as u32 * config.weight_lessons_lost
        + dropped as u32 * config.weight_items_dropped;

    if metrics.settings_defaulted_ratio > 0.0 {
        let proportional =
            (metrics.settings_defaulted_ratio * config.settings_defaulted_proportional as f64)
                .round() as u32;
        total += config.settings_defaulted_baseline + proportional;
    }

    total += metrics.components_defaulted_count as u32 * config.weight_component_defaulted;
    total += index_from_newest as u32 * config.weight_backup_index;

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LoaderConfig {
        LoaderConfig::default()
    }

    #[test]
    fn test_lessons_lost_dominates() {
        let metrics = RecoveryMetrics {
            lessons_lost_to_corruption: 1,
            ..Default::default()
        };
        assert_eq!(score(&metrics, 0, &config()), 20_000);
    }

    #[test]
    fn test_settings_defaulting_applies_baseline_plus_proportional() {
        let metrics = RecoveryMetrics {
            settings_defaulted_ratio: 0.5,
            ..Default::default()
        };
        // 1000 baseline + round(0.5 * 4000) = 1000 + 2000 = 3000
        assert_eq!(score(&metrics, 0, &config()), 3000);
    }

    #[test]
    fn test_zero_defaulted_ratio_has_no_baseline_bonus() {
        let metrics = RecoveryMetrics {
            settings_defaulted_ratio: 0.0,
            ..Default::default()
        };
        assert_eq!(score(&metrics, 0, &config()), 0);
    }

    #[test]
    fn test_backup_index_scales_linearly() {
        let metrics = RecoveryMetrics::default();
        assert_eq!(score(&metrics, 3, &config()), 1500);
    }

    #[test]
    fn test_components_defaulted_weight() {
        let metrics = RecoveryMetrics {
            components_defaulted_count: 4,
            ..Default::default()
        };
        assert_eq!(score(&metrics, 0, &config()), 20);
    }
}
