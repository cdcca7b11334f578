//! Progress Integrity (C)
//!
//! Parses raw bytes into a canonical `Bundle`, detecting corruption and
//! reconciling the result against the Curriculum Registry. `enforce` never
//! propagates an error: every failure mode short of the one documented
//! programmer bug below is absorbed into defaulting and reported through
//! `RecoveryMetrics`/`CriticalFailures` instead.

use std::collections::HashMap;

use mera_core::domain::{
    Bundle, CombinedComponentProgress, CompletionEntry, ComponentProgress, FocusIndicatorStyle,
    FontSize, LearningPace, Metadata, NavigationState, OverallProgress, Settings, Theme,
    TimestampedField, WeekStartDay, WeekStartTimeUtc, SETTINGS_FIELD_COUNT,
};
use mera_core::ports::CurriculumRegistry;

use crate::metrics::{CriticalFailures, RecoveryMetrics, WebIdMismatch};

/// The result of running raw bytes (or a previously-sanitized bundle, for
/// the merge-validation round-trip in §4.7.2) through Progress Integrity.
pub use crate::metrics::EnforcementResult;

/// Parses and sanitizes `raw_json` against `expected_web_id` and `registry`.
///
/// # Panics
///
/// Panics if `parsed_lessons` is empty: Progress Integrity is never called
/// before the curriculum has finished loading, so an empty lesson map can
/// only mean the caller invoked this out of order.
pub fn enforce(
    raw_json: &str,
    expected_web_id: &str,
    registry: &dyn CurriculumRegistry,
    parsed_lessons: &HashMap<String, serde_json::Value>,
) -> EnforcementResult {
    assert!(
        !parsed_lessons.is_empty(),
        "enforce() called before the curriculum finished loading"
    );

    let Ok(raw) = serde_json::from_str::<serde_json::Value>(raw_json) else {
        tracing::warn!(expected_web_id, "raw bytes did not parse as JSON, defaulting whole bundle");
        return EnforcementResult::fully_defaulted(WebIdMismatch {
            expected: expected_web_id.to_string(),
            found: None,
        });
    };

    let (metadata, web_id_mismatch) = extract_metadata(&raw, expected_web_id);
    if let Some(mismatch) = web_id_mismatch {
        tracing::warn!(
            expected = %mismatch.expected,
            found = ?mismatch.found,
            "web id mismatch, defaulting whole bundle"
        );
        return EnforcementResult::fully_defaulted(mismatch);
    }

    let (overall_progress, lessons_lost, domains_lost, lessons_dropped, domains_dropped) =
        extract_overall_progress(raw.get("overallProgress"), registry);

    let (settings, settings_defaulted_count) = extract_settings(raw.get("settings"));

    let (navigation_state, navigation_defaulted) =
        extract_navigation_state(raw.get("navigationState"), registry);

    let (combined_component_progress, components_defaulted_count, components_retained_count) =
        extract_component_progress(
            raw.get("combinedComponentProgress"),
            registry,
            parsed_lessons,
        );

    let lessons_dropped_ratio = ratio(lessons_dropped, overall_progress.total_lessons_completed);
    let domains_dropped_ratio = ratio(domains_dropped, overall_progress.total_domains_completed);
    let settings_defaulted_ratio = settings_defaulted_count as f64 / SETTINGS_FIELD_COUNT as f64;

    let recovery_metrics = RecoveryMetrics {
        lessons_lost_to_corruption: lessons_lost,
        domains_lost_to_corruption: domains_lost,
        lessons_dropped_count: lessons_dropped,
        domains_dropped_count: domains_dropped,
        lessons_dropped_ratio,
        domains_dropped_ratio,
        settings_defaulted_count,
        settings_defaulted_ratio,
        navigation_defaulted,
        components_defaulted_count,
        components_retained_count,
    };

    let perfectly_valid_input = !recovery_metrics.corruption_detected()
        && recovery_metrics.items_dropped_count() == 0
        && settings_defaulted_count == 0
        && !navigation_defaulted
        && components_defaulted_count == 0;

    if recovery_metrics.corruption_detected() {
        tracing::warn!(
            lessons_lost = recovery_metrics.lessons_lost_to_corruption,
            domains_lost = recovery_metrics.domains_lost_to_corruption,
            "counter corruption detected, counters corrected to actual completions"
        );
    }
    if !perfectly_valid_input {
        tracing::debug!(
            items_dropped = recovery_metrics.items_dropped_count(),
            settings_defaulted = settings_defaulted_count,
            navigation_defaulted,
            components_defaulted = components_defaulted_count,
            "bundle required partial defaulting"
        );
    }

    EnforcementResult {
        bundle: Bundle {
            metadata,
            overall_progress,
            settings,
            navigation_state,
            combined_component_progress,
        },
        perfectly_valid_input,
        recovery_metrics,
        critical_failures: CriticalFailures::default(),
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

// ============================================================================
// §4.5 phase 2: Metadata (I1)
// ============================================================================

fn extract_metadata(raw: &serde_json::Value, expected_web_id: &str) -> (Metadata, Option<WebIdMismatch>) {
    let found = raw.get("metadata").and_then(|m| m.get("webId")).and_then(|w| w.as_str());
    match found {
        Some(web_id) if web_id == expected_web_id => (Metadata::for_web_id(web_id), None),
        other => (
            Metadata::for_web_id(expected_web_id),
            Some(WebIdMismatch {
                expected: expected_web_id.to_string(),
                found: other.map(|s| s.to_string()),
            }),
        ),
    }
}

// ============================================================================
// §4.5 phase 2 + §4.5.1: OverallProgress (I2, I3, I4)
// ============================================================================

fn extract_completion_map(raw: Option<&serde_json::Value>) -> HashMap<String, CompletionEntry> {
    let mut map = HashMap::new();
    let Some(obj) = raw.and_then(|v| v.as_object()) else {
        return map;
    };
    for (key, entry) in obj {
        let first_completed = entry.get("firstCompleted").and_then(|v| v.as_i64());
        let last_updated = entry.get("lastUpdated").and_then(|v| v.as_i64()).unwrap_or(0);
        map.insert(
            key.clone(),
            CompletionEntry {
                first_completed,
                last_updated,
            },
        );
    }
    map
}

fn reconcile_completions(
    mut map: HashMap<String, CompletionEntry>,
    claimed_total: u64,
    known: impl Fn(&str) -> bool,
) -> (HashMap<String, CompletionEntry>, u64, u64, u64) {
    let actual = map.values().filter(|e| e.is_completed()).count() as u64;
    let lost_to_corruption = claimed_total.saturating_sub(actual);

    let before = map.len();
    map.retain(|key, _| known(key));
    let dropped = (before - map.len()) as u64;

    let final_total = map.values().filter(|e| e.is_completed()).count() as u64;
    (map, lost_to_corruption, final_total, dropped)
}

fn extract_overall_progress(
    raw: Option<&serde_json::Value>,
    registry: &dyn CurriculumRegistry,
) -> (OverallProgress, u64, u64, u64, u64) {
    let lesson_completions = extract_completion_map(raw.and_then(|v| v.get("lessonCompletions")));
    let domain_completions = extract_completion_map(raw.and_then(|v| v.get("domainCompletions")));

    let claimed_lessons = raw
        .and_then(|v| v.get("totalLessonsCompleted"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let claimed_domains = raw
        .and_then(|v| v.get("totalDomainsCompleted"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let (lesson_completions, lessons_lost, total_lessons_completed, lessons_dropped) =
        reconcile_completions(lesson_completions, claimed_lessons, |id| registry.has_lesson(id));
    let (domain_completions, domains_lost, total_domains_completed, domains_dropped) =
        reconcile_completions(domain_completions, claimed_domains, |id| registry.has_domain(id));

    let current_streak = raw
        .and_then(|v| v.get("currentStreak"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let last_streak_check = raw
        .and_then(|v| v.get("lastStreakCheck"))
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    (
        OverallProgress {
            lesson_completions,
            domain_completions,
            total_lessons_completed,
            total_domains_completed,
            current_streak,
            last_streak_check,
        },
        lessons_lost,
        domains_lost,
        lessons_dropped,
        domains_dropped,
    )
}

// ============================================================================
// §4.5 phase 2: Settings (I6) - each of the 11 fields independently defaulted
// ============================================================================

/// Reads one settings field entry `{ value, lastUpdated }` by name, returning
/// the raw value and timestamp only if the timestamp is present and
/// non-negative. Per-type validation of `value` is the caller's job.
fn read_field_entry<'a>(raw: Option<&'a serde_json::Value>, name: &str) -> Option<(&'a serde_json::Value, i64)> {
    let entry = raw?.get(name)?;
    let value = entry.get("value")?;
    let last_updated = entry.get("lastUpdated")?.as_i64()?;
    if last_updated < 0 {
        return None;
    }
    Some((value, last_updated))
}

fn extract_week_start_day(raw: Option<&serde_json::Value>, defaulted_count: &mut u32) -> TimestampedField<WeekStartDay> {
    match read_field_entry(raw, "weekStartDay").and_then(|(v, ts)| v.as_u64().map(|n| (n, ts))) {
        Some((n, ts)) if n <= 6 => TimestampedField::new(WeekStartDay(n as u8), ts),
        _ => {
            *defaulted_count += 1;
            TimestampedField::new(WeekStartDay::default(), 0)
        }
    }
}

fn extract_week_start_time_utc(raw: Option<&serde_json::Value>, defaulted_count: &mut u32) -> TimestampedField<WeekStartTimeUtc> {
    match read_field_entry(raw, "weekStartTimeUtc").and_then(|(v, ts)| v.as_u64().map(|n| (n, ts))) {
        Some((n, ts)) if n < 24 * 60 => TimestampedField::new(WeekStartTimeUtc(n as u16), ts),
        _ => {
            *defaulted_count += 1;
            TimestampedField::new(WeekStartTimeUtc::default(), 0)
        }
    }
}

fn extract_theme(raw: Option<&serde_json::Value>, defaulted_count: &mut u32) -> TimestampedField<Theme> {
    match read_field_entry(raw, "theme").and_then(|(v, ts)| v.as_str().map(|s| (s, ts))) {
        Some(("light", ts)) => TimestampedField::new(Theme::Light, ts),
        Some(("dark", ts)) => TimestampedField::new(Theme::Dark, ts),
        Some(("system", ts)) => TimestampedField::new(Theme::System, ts),
        _ => {
            *defaulted_count += 1;
            TimestampedField::new(Theme::default(), 0)
        }
    }
}

fn extract_learning_pace(raw: Option<&serde_json::Value>, defaulted_count: &mut u32) -> TimestampedField<LearningPace> {
    match read_field_entry(raw, "learningPace").and_then(|(v, ts)| v.as_str().map(|s| (s, ts))) {
        Some(("relaxed", ts)) => TimestampedField::new(LearningPace::Relaxed, ts),
        Some(("standard", ts)) => TimestampedField::new(LearningPace::Standard, ts),
        Some(("intensive", ts)) => TimestampedField::new(LearningPace::Intensive, ts),
        _ => {
            *defaulted_count += 1;
            TimestampedField::new(LearningPace::default(), 0)
        }
    }
}

fn extract_bool_field(raw: Option<&serde_json::Value>, name: &str, defaulted_count: &mut u32) -> TimestampedField<bool> {
    match read_field_entry(raw, name).and_then(|(v, ts)| v.as_bool().map(|b| (b, ts))) {
        Some((b, ts)) => TimestampedField::new(b, ts),
        None => {
            *defaulted_count += 1;
            TimestampedField::new(false, 0)
        }
    }
}

fn extract_font_size(raw: Option<&serde_json::Value>, defaulted_count: &mut u32) -> TimestampedField<FontSize> {
    match read_field_entry(raw, "fontSize").and_then(|(v, ts)| v.as_str().map(|s| (s, ts))) {
        Some(("small", ts)) => TimestampedField::new(FontSize::Small, ts),
        Some(("medium", ts)) => TimestampedField::new(FontSize::Medium, ts),
        Some(("large", ts)) => TimestampedField::new(FontSize::Large, ts),
        Some(("extra_large", ts)) => TimestampedField::new(FontSize::ExtraLarge, ts),
        _ => {
            *defaulted_count += 1;
            TimestampedField::new(FontSize::default(), 0)
        }
    }
}

fn extract_focus_indicator_style(
    raw: Option<&serde_json::Value>,
    defaulted_count: &mut u32,
) -> TimestampedField<FocusIndicatorStyle> {
    match read_field_entry(raw, "focusIndicatorStyle").and_then(|(v, ts)| v.as_str().map(|s| (s, ts))) {
        Some(("default", ts)) => TimestampedField::new(FocusIndicatorStyle::Default, ts),
        Some(("high_visibility", ts)) => TimestampedField::new(FocusIndicatorStyle::HighVisibility, ts),
        Some(("thick", ts)) => TimestampedField::new(FocusIndicatorStyle::Thick, ts),
        _ => {
            *defaulted_count += 1;
            TimestampedField::new(FocusIndicatorStyle::default(), 0)
        }
    }
}

fn extract_settings(raw: Option<&serde_json::Value>) -> (Settings, u32) {
    let mut defaulted_count = 0u32;

    let settings = Settings {
        week_start_day: extract_week_start_day(raw, &mut defaulted_count),
        week_start_time_utc: extract_week_start_time_utc(raw, &mut defaulted_count),
        theme: extract_theme(raw, &mut defaulted_count),
        learning_pace: extract_learning_pace(raw, &mut defaulted_count),
        opt_out_analytics: extract_bool_field(raw, "optOutAnalytics", &mut defaulted_count),
        opt_out_marketing: extract_bool_field(raw, "optOutMarketing", &mut defaulted_count),
        font_size: extract_font_size(raw, &mut defaulted_count),
        high_contrast: extract_bool_field(raw, "highContrast", &mut defaulted_count),
        reduced_motion: extract_bool_field(raw, "reducedMotion", &mut defaulted_count),
        focus_indicator_style: extract_focus_indicator_style(raw, &mut defaulted_count),
        audio_enabled: extract_bool_field(raw, "audioEnabled", &mut defaulted_count),
    };

    (settings, defaulted_count)
}

// ============================================================================
// §4.5 phase 2: NavigationState (I7) - accept-whole-or-default-whole
// ============================================================================

fn extract_navigation_state(
    raw: Option<&serde_json::Value>,
    registry: &dyn CurriculumRegistry,
) -> (NavigationState, bool) {
    let Some(raw) = raw else {
        return (NavigationState::default(), true);
    };

    let current_entity_id = raw.get("currentEntityId").and_then(|v| v.as_u64());
    let current_page = raw.get("currentPage").and_then(|v| v.as_u64());
    let last_updated = raw.get("lastUpdated").and_then(|v| v.as_i64());

    let (Some(entity_id), Some(page), Some(ts)) = (current_entity_id, current_page, last_updated) else {
        return (NavigationState::default(), true);
    };

    let entity_valid = entity_id == 0 || registry.has_entity(&entity_id.to_string());
    if !entity_valid {
        return (NavigationState::default(), true);
    }

    if entity_id != 0 {
        let page_count = registry.get_entity_page_count(&entity_id.to_string()).unwrap_or(0);
        if page >= page_count as u64 {
            return (NavigationState::default(), true);
        }
    }

    (
        NavigationState {
            current_entity_id: entity_id,
            current_page: page as u32,
            last_updated: ts,
        },
        false,
    )
}

// ============================================================================
// §4.5 phase 2: CombinedComponentProgress (I5)
// ============================================================================

fn extract_component_progress(
    raw: Option<&serde_json::Value>,
    registry: &dyn CurriculumRegistry,
    parsed_lessons: &HashMap<String, serde_json::Value>,
) -> (CombinedComponentProgress, usize, usize) {
    let stored = raw
        .and_then(|v| v.get("components"))
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let mut components = HashMap::new();
    let mut defaulted_count = 0usize;
    let mut retained_count = 0usize;

    for component_id in registry.get_all_component_ids() {
        let component_type = match registry.get_component_type(&component_id) {
            Some(t) => t,
            None => {
                defaulted_count += 1;
                continue;
            }
        };

        let validator = registry.component_validator(&component_type);
        let stored_entry = stored.get(&component_id).and_then(|v| v.as_object());

        let kept = match (validator, stored_entry) {
            (Some(validator), Some(entry)) => {
                let shape_ok = validator.validate_shape(entry);
                let structure_ok = match registry
                    .get_lesson_id_for_component(&component_id)
                    .and_then(|lesson_id| parsed_lessons.get(&lesson_id))
                {
                    Some(lesson_config) => validator.validate_against_lesson(entry, lesson_config),
                    None => true,
                };
                if shape_ok && structure_ok {
                    let last_updated = entry.get("lastUpdated").and_then(|v| v.as_i64()).unwrap_or(0);
                    Some(ComponentProgress {
                        component_type: component_type.clone(),
                        last_updated,
                        payload: entry.clone(),
                    })
                } else {
                    None
                }
            }
            _ => None,
        };

        match kept {
            Some(progress) => {
                retained_count += 1;
                components.insert(component_id, progress);
            }
            None => {
                defaulted_count += 1;
                let default_payload = validator
                    .map(|v| v.default_progress())
                    .unwrap_or_default();
                components.insert(
                    component_id,
                    ComponentProgress {
                        component_type,
                        last_updated: 0,
                        payload: default_payload,
                    },
                );
            }
        }
    }

    (CombinedComponentProgress { components }, defaulted_count, retained_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mera_core::testing::TestCurriculumRegistry;

    fn registry_with_lesson(id: &str) -> TestCurriculumRegistry {
        TestCurriculumRegistry {
            lessons: vec![id.to_string()],
            ..Default::default()
        }
    }

    fn lessons_map() -> HashMap<String, serde_json::Value> {
        let mut m = HashMap::new();
        m.insert("placeholder".to_string(), serde_json::json!({}));
        m
    }

    #[test]
    fn test_unparseable_json_returns_fully_defaulted_bundle() {
        let registry = TestCurriculumRegistry::default();
        let result = enforce("not json", "web-1", &registry, &lessons_map());
        assert!(!result.perfectly_valid_input);
        assert_eq!(
            result.critical_failures.web_id_mismatch.unwrap().found,
            None
        );
    }

    #[test]
    fn test_web_id_mismatch_is_a_critical_failure() {
        let registry = TestCurriculumRegistry::default();
        let raw = serde_json::json!({ "metadata": { "webId": "other-web" } }).to_string();
        let result = enforce(&raw, "web-1", &registry, &lessons_map());
        assert!(!result.perfectly_valid_input);
        let mismatch = result.critical_failures.web_id_mismatch.unwrap();
        assert_eq!(mismatch.expected, "web-1");
        assert_eq!(mismatch.found.as_deref(), Some("other-web"));
    }

    #[test]
    fn test_matching_web_id_has_no_critical_failure() {
        let registry = registry_with_lesson("lesson-1");
        let raw = serde_json::json!({ "metadata": { "webId": "web-1" } }).to_string();
        let result = enforce(&raw, "web-1", &registry, &lessons_map());
        assert!(result.critical_failures.is_empty());
    }

    #[test]
    fn test_counter_corruption_is_detected_and_corrected() {
        let registry = registry_with_lesson("lesson-1");
        let raw = serde_json::json!({
            "metadata": { "webId": "web-1" },
            "overallProgress": {
                "lessonCompletions": {
                    "lesson-1": { "firstCompleted": 100, "lastUpdated": 100 }
                },
                "totalLessonsCompleted": 5
            }
        })
        .to_string();
        let result = enforce(&raw, "web-1", &registry, &lessons_map());
        assert!(result.recovery_metrics.corruption_detected());
        assert_eq!(result.recovery_metrics.lessons_lost_to_corruption, 4);
        assert_eq!(result.bundle.overall_progress.total_lessons_completed, 1);
    }

    #[test]
    fn test_unknown_lesson_keys_are_dropped() {
        let registry = registry_with_lesson("lesson-1");
        let raw = serde_json::json!({
            "metadata": { "webId": "web-1" },
            "overallProgress": {
                "lessonCompletions": {
                    "lesson-1": { "firstCompleted": 100, "lastUpdated": 100 },
                    "ghost-lesson": { "firstCompleted": 200, "lastUpdated": 200 }
                },
                "totalLessonsCompleted": 2
            }
        })
        .to_string();
        let result = enforce(&raw, "web-1", &registry, &lessons_map());
        assert_eq!(result.bundle.overall_progress.lesson_completions.len(), 1);
        assert_eq!(result.recovery_metrics.lessons_dropped_count, 1);
        assert_eq!(result.bundle.overall_progress.total_lessons_completed, 1);
    }

    #[test]
    fn test_settings_partial_defaulting_tracks_ratio() {
        let registry = TestCurriculumRegistry::default();
        let raw = serde_json::json!({
            "metadata": { "webId": "web-1" },
            "settings": {
                "theme": { "value": "dark", "lastUpdated": 10 },
                "audioEnabled": { "value": "not-a-bool", "lastUpdated": 10 }
            }
        })
        .to_string();
        let result = enforce(&raw, "web-1", &registry, &lessons_map());
        assert_eq!(result.bundle.settings.theme.value, Theme::Dark);
        assert_eq!(result.bundle.settings.audio_enabled.value, false);
        assert_eq!(result.recovery_metrics.settings_defaulted_count, 10);
    }

    #[test]
    fn test_navigation_state_rejects_unknown_entity() {
        let registry = TestCurriculumRegistry::default();
        let raw = serde_json::json!({
            "metadata": { "webId": "web-1" },
            "navigationState": { "currentEntityId": 42, "currentPage": 0, "lastUpdated": 10 }
        })
        .to_string();
        let result = enforce(&raw, "web-1", &registry, &lessons_map());
        assert!(result.recovery_metrics.navigation_defaulted);
        assert_eq!(result.bundle.navigation_state.current_entity_id, 0);
    }

    #[test]
    fn test_navigation_state_zero_entity_is_always_valid() {
        let registry = TestCurriculumRegistry::default();
        let raw = serde_json::json!({
            "metadata": { "webId": "web-1" },
            "navigationState": { "currentEntityId": 0, "currentPage": 0, "lastUpdated": 10 }
        })
        .to_string();
        let result = enforce(&raw, "web-1", &registry, &lessons_map());
        assert!(!result.recovery_metrics.navigation_defaulted);
    }

    #[test]
    fn test_perfectly_valid_input_with_no_registry_components() {
        let registry = registry_with_lesson("lesson-1");
        let raw = serde_json::json!({ "metadata": { "webId": "web-1" } }).to_string();
        let result = enforce(&raw, "web-1", &registry, &lessons_map());
        assert!(result.perfectly_valid_input);
    }

    #[test]
    #[should_panic]
    fn test_panics_on_empty_parsed_lessons() {
        let registry = TestCurriculumRegistry::default();
        enforce("{}", "web-1", &registry, &HashMap::new());
    }
}
