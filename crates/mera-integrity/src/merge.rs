//! Progress Merger (D)
//!
//! A pure, deterministic merge of two already-sanitized bundles. Every
//! field merges by last-write-wins on its own timestamp, ties favoring `a`;
//! the two completion-count totals are always recomputed from the merged
//! maps rather than merged as counters, which is what keeps I2/I3 holding
//! after a merge (I8).

use std::collections::HashMap;

use mera_core::domain::{Bundle, CompletionEntry, TimestampedField};

/// Merges `a` and `b` into one bundle. Ties throughout favor `a`.
pub fn merge(a: &Bundle, b: &Bundle) -> Bundle {
    tracing::debug!(
        web_id = %a.metadata.web_id,
        a_lessons = a.overall_progress.lesson_completions.len(),
        b_lessons = b.overall_progress.lesson_completions.len(),
        "merging two sanitized bundles"
    );

    let (lesson_completions, total_lessons_completed) = merge_completions(
        &a.overall_progress.lesson_completions,
        &b.overall_progress.lesson_completions,
    );
    let (domain_completions, total_domains_completed) = merge_completions(
        &a.overall_progress.domain_completions,
        &b.overall_progress.domain_completions,
    );

    let (current_streak, last_streak_check) = if b.overall_progress.last_streak_check
        > a.overall_progress.last_streak_check
    {
        (
            b.overall_progress.current_streak,
            b.overall_progress.last_streak_check,
        )
    } else {
        (
            a.overall_progress.current_streak,
            a.overall_progress.last_streak_check.max(b.overall_progress.last_streak_check),
        )
    };

    let navigation_state = if b.navigation_state.last_updated > a.navigation_state.last_updated {
        b.navigation_state.clone()
    } else {
        a.navigation_state.clone()
    };

    let mut components = HashMap::new();
    for (id, progress) in &a.combined_component_progress.components {
        components.insert(id.clone(), progress.clone());
    }
    for (id, b_progress) in &b.combined_component_progress.components {
        match components.get(id) {
            Some(a_progress) if a_progress.last_updated >= b_progress.last_updated => {}
            _ => {
                components.insert(id.clone(), b_progress.clone());
            }
        }
    }

    Bundle {
        metadata: a.metadata.clone(),
        overall_progress: mera_core::domain::OverallProgress {
            lesson_completions,
            domain_completions,
            total_lessons_completed,
            total_domains_completed,
            current_streak,
            last_streak_check,
        },
        settings: mera_core::domain::Settings {
            week_start_day: a.settings.week_start_day.clone().pick_newer(b.settings.week_start_day.clone()),
            week_start_time_utc: a
                .settings
                .week_start_time_utc
                .clone()
                .pick_newer(b.settings.week_start_time_utc.clone()),
            theme: a.settings.theme.clone().pick_newer(b.settings.theme.clone()),
            learning_pace: a.settings.learning_pace.clone().pick_newer(b.settings.learning_pace.clone()),
            opt_out_analytics: a
                .settings
                .opt_out_analytics
                .clone()
                .pick_newer(b.settings.opt_out_analytics.clone()),
            opt_out_marketing: a
                .settings
                .opt_out_marketing
                .clone()
                .pick_newer(b.settings.opt_out_marketing.clone()),
            font_size: a.settings.font_size.clone().pick_newer(b.settings.font_size.clone()),
            high_contrast: a.settings.high_contrast.clone().pick_newer(b.settings.high_contrast.clone()),
            reduced_motion: a.settings.reduced_motion.clone().pick_newer(b.settings.reduced_motion.clone()),
            focus_indicator_style: a
                .settings
                .focus_indicator_style
                .clone()
                .pick_newer(b.settings.focus_indicator_style.clone()),
            audio_enabled: a.settings.audio_enabled.clone().pick_newer(b.settings.audio_enabled.clone()),
        },
        navigation_state,
        combined_component_progress: mera_core::domain::CombinedComponentProgress { components },
    }
}

/// Merges two completion maps entry-by-entry (larger `last_updated` wins,
/// tie favors `a`; keys present in only one side carry over), then
/// recomputes the total from the merged map rather than merging the two
/// input totals.
fn merge_completions(
    a: &HashMap<String, CompletionEntry>,
    b: &HashMap<String, CompletionEntry>,
) -> (HashMap<String, CompletionEntry>, u64) {
    let mut merged = a.clone();
    for (key, b_entry) in b {
        match merged.get(key) {
            Some(a_entry) if a_entry.last_updated >= b_entry.last_updated => {}
            _ => {
                merged.insert(key.clone(), b_entry.clone());
            }
        }
    }
    let total = merged.values().filter(|e| e.is_completed()).count() as u64;
    (merged, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mera_core::domain::Bundle;
    use std::collections::HashMap;

    fn bundle_with_lesson(id: &str, first_completed: i64, last_updated: i64) -> Bundle {
        let mut lesson_completions = HashMap::new();
        lesson_completions.insert(
            id.to_string(),
            CompletionEntry::new(first_completed, last_updated),
        );
        Bundle {
            overall_progress: mera_core::domain::OverallProgress {
                lesson_completions,
                total_lessons_completed: 1,
                ..Default::default()
            },
            ..Bundle::default()
        }
    }

    #[test]
    fn test_merge_keeps_newer_entry_for_shared_key() {
        let a = bundle_with_lesson("lesson-1", 100, 100);
        let b = bundle_with_lesson("lesson-1", 100, 200);
        let merged = merge(&a, &b);
        assert_eq!(
            merged.overall_progress.lesson_completions["lesson-1"].last_updated,
            200
        );
    }

    #[test]
    fn test_merge_tie_favors_a() {
        let mut a = bundle_with_lesson("lesson-1", 100, 100);
        a.metadata.web_id = "from-a".to_string();
        let b = bundle_with_lesson("lesson-1", 999, 100);
        let merged = merge(&a, &b);
        assert_eq!(merged.overall_progress.lesson_completions["lesson-1"].first_completed, Some(100));
        assert_eq!(merged.metadata.web_id, "from-a");
    }

    #[test]
    fn test_merge_carries_over_keys_present_in_only_one_side() {
        let a = bundle_with_lesson("lesson-1", 100, 100);
        let b = bundle_with_lesson("lesson-2", 200, 200);
        let merged = merge(&a, &b);
        assert_eq!(merged.overall_progress.lesson_completions.len(), 2);
        assert_eq!(merged.overall_progress.total_lessons_completed, 2);
    }

    #[test]
    fn test_merge_recomputes_total_rather_than_summing() {
        let mut a = bundle_with_lesson("lesson-1", 100, 100);
        a.overall_progress.total_lessons_completed = 900; // corrupt counter
        let b = bundle_with_lesson("lesson-1", 100, 50);
        let merged = merge(&a, &b);
        assert_eq!(merged.overall_progress.total_lessons_completed, 1);
    }

    #[test]
    fn test_merge_settings_field_is_independent_last_write_wins() {
        let mut a = Bundle::default();
        a.settings.theme = TimestampedField::new(mera_core::domain::Theme::Dark, 50);
        a.settings.audio_enabled = TimestampedField::new(true, 500);
        let mut b = Bundle::default();
        b.settings.theme = TimestampedField::new(mera_core::domain::Theme::Light, 100);
        b.settings.audio_enabled = TimestampedField::new(false, 10);

        let merged = merge(&a, &b);
        assert_eq!(merged.settings.theme.value, mera_core::domain::Theme::Light);
        assert_eq!(merged.settings.audio_enabled.value, true);
    }

    #[test]
    fn test_merge_navigation_state_whole_object_lww() {
        let mut a = Bundle::default();
        a.navigation_state.current_entity_id = 1;
        a.navigation_state.last_updated = 10;
        let mut b = Bundle::default();
        b.navigation_state.current_entity_id = 2;
        b.navigation_state.last_updated = 20;

        let merged = merge(&a, &b);
        assert_eq!(merged.navigation_state.current_entity_id, 2);
    }

    #[test]
    fn test_merge_components_whole_object_lww_missing_keys_carry_over() {
        use mera_core::domain::ComponentProgress;

        let mut a = Bundle::default();
        a.combined_component_progress.components.insert(
            "comp-1".to_string(),
            ComponentProgress {
                component_type: "quiz".to_string(),
                last_updated: 100,
                payload: serde_json::Map::new(),
            },
        );
        let mut b = Bundle::default();
        b.combined_component_progress.components.insert(
            "comp-2".to_string(),
            ComponentProgress {
                component_type: "quiz".to_string(),
                last_updated: 50,
                payload: serde_json::Map::new(),
            },
        );

        let merged = merge(&a, &b);
        assert_eq!(merged.combined_component_progress.components.len(), 2);
    }
}
