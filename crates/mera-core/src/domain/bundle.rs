//! The Bundle - the canonical, validated progress document for one learner
//!
//! Every section below carries a `Default` impl; Progress Integrity falls
//! back to these defaults whenever a stored value fails validation, and the
//! fully-defaulted `Bundle` itself is what gets returned when raw bytes
//! don't even parse as JSON.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::newtypes::TimestampedField;

// ============================================================================
// Metadata
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "webId")]
    pub web_id: String,
}

impl Metadata {
    pub fn for_web_id(web_id: impl Into<String>) -> Self {
        Self { web_id: web_id.into() }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self { web_id: String::new() }
    }
}

// ============================================================================
// OverallProgress
// ============================================================================

/// One completed lesson or domain: when it was first completed, and when
/// this entry was last touched (used for merge LWW).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEntry {
    #[serde(rename = "firstCompleted")]
    pub first_completed: Option<i64>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
}

impl CompletionEntry {
    pub fn new(first_completed: i64, last_updated: i64) -> Self {
        Self {
            first_completed: Some(first_completed),
            last_updated,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.first_completed.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallProgress {
    #[serde(rename = "lessonCompletions")]
    pub lesson_completions: HashMap<String, CompletionEntry>,
    #[serde(rename = "domainCompletions")]
    pub domain_completions: HashMap<String, CompletionEntry>,
    #[serde(rename = "totalLessonsCompleted")]
    pub total_lessons_completed: u64,
    #[serde(rename = "totalDomainsCompleted")]
    pub total_domains_completed: u64,
    #[serde(rename = "currentStreak")]
    pub current_streak: u32,
    #[serde(rename = "lastStreakCheck")]
    pub last_streak_check: i64,
}

impl Default for OverallProgress {
    fn default() -> Self {
        Self {
            lesson_completions: HashMap::new(),
            domain_completions: HashMap::new(),
            total_lessons_completed: 0,
            total_domains_completed: 0,
            current_streak: 0,
            last_streak_check: 0,
        }
    }
}

// ============================================================================
// Settings - eleven independently-defaulted, independently-timestamped fields
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::System
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningPace {
    Relaxed,
    Standard,
    Intensive,
}

impl Default for LearningPace {
    fn default() -> Self {
        LearningPace::Standard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl Default for FontSize {
    fn default() -> Self {
        FontSize::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusIndicatorStyle {
    Default,
    HighVisibility,
    Thick,
}

impl Default for FocusIndicatorStyle {
    fn default() -> Self {
        FocusIndicatorStyle::Default
    }
}

/// ISO weekday the learner's week begins on. `0 = Sunday ..= 6 = Saturday`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekStartDay(pub u8);

impl WeekStartDay {
    pub fn is_valid(self) -> bool {
        self.0 <= 6
    }
}

impl Default for WeekStartDay {
    fn default() -> Self {
        WeekStartDay(0)
    }
}

/// Minutes since UTC midnight the daily reminder/streak check fires at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekStartTimeUtc(pub u16);

impl WeekStartTimeUtc {
    pub fn is_valid(self) -> bool {
        self.0 < 24 * 60
    }
}

impl Default for WeekStartTimeUtc {
    fn default() -> Self {
        WeekStartTimeUtc(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "weekStartDay")]
    pub week_start_day: TimestampedField<WeekStartDay>,
    #[serde(rename = "weekStartTimeUtc")]
    pub week_start_time_utc: TimestampedField<WeekStartTimeUtc>,
    pub theme: TimestampedField<Theme>,
    #[serde(rename = "learningPace")]
    pub learning_pace: TimestampedField<LearningPace>,
    #[serde(rename = "optOutAnalytics")]
    pub opt_out_analytics: TimestampedField<bool>,
    #[serde(rename = "optOutMarketing")]
    pub opt_out_marketing: TimestampedField<bool>,
    #[serde(rename = "fontSize")]
    pub font_size: TimestampedField<FontSize>,
    #[serde(rename = "highContrast")]
    pub high_contrast: TimestampedField<bool>,
    #[serde(rename = "reducedMotion")]
    pub reduced_motion: TimestampedField<bool>,
    #[serde(rename = "focusIndicatorStyle")]
    pub focus_indicator_style: TimestampedField<FocusIndicatorStyle>,
    #[serde(rename = "audioEnabled")]
    pub audio_enabled: TimestampedField<bool>,
}

/// The number of independently-validated settings fields (§4.5's defaulted_ratio denominator).
pub const SETTINGS_FIELD_COUNT: u32 = 11;

impl Default for Settings {
    fn default() -> Self {
        Self {
            week_start_day: TimestampedField::new(WeekStartDay::default(), 0),
            week_start_time_utc: TimestampedField::new(WeekStartTimeUtc::default(), 0),
            theme: TimestampedField::new(Theme::default(), 0),
            learning_pace: TimestampedField::new(LearningPace::default(), 0),
            opt_out_analytics: TimestampedField::new(false, 0),
            opt_out_marketing: TimestampedField::new(false, 0),
            font_size: TimestampedField::new(FontSize::default(), 0),
            high_contrast: TimestampedField::new(false, 0),
            reduced_motion: TimestampedField::new(false, 0),
            focus_indicator_style: TimestampedField::new(FocusIndicatorStyle::default(), 0),
            audio_enabled: TimestampedField::new(false, 0),
        }
    }
}

// ============================================================================
// NavigationState - ephemeral, accept-whole-or-default-whole
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    #[serde(rename = "currentEntityId")]
    pub current_entity_id: u64,
    #[serde(rename = "currentPage")]
    pub current_page: u32,
    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_entity_id: 0,
            current_page: 0,
            last_updated: 0,
        }
    }
}

// ============================================================================
// CombinedComponentProgress - tagged-variant progress records
// ============================================================================

/// A single component's progress.
///
/// The payload is an opaque, type-tagged blob rather than a closed enum:
/// §9 prefers a type tag plus type-keyed validator/initializer maps
/// (registered by the embedding application) over a fixed Rust enum of
/// every possible component shape, since the set of component types is
/// owned by the Curriculum Registry, not by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentProgress {
    #[serde(rename = "componentType")]
    pub component_type: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedComponentProgress {
    pub components: HashMap<String, ComponentProgress>,
}

impl Default for CombinedComponentProgress {
    fn default() -> Self {
        Self {
            components: HashMap::new(),
        }
    }
}

// ============================================================================
// Bundle
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Bundle {
    pub metadata: Metadata,
    #[serde(rename = "overallProgress")]
    pub overall_progress: OverallProgress,
    pub settings: Settings,
    #[serde(rename = "navigationState")]
    pub navigation_state: NavigationState,
    #[serde(rename = "combinedComponentProgress")]
    pub combined_component_progress: CombinedComponentProgress,
}

impl Bundle {
    /// A fully-defaulted bundle for the given web id, used whenever raw
    /// bytes fail to parse at all.
    pub fn defaulted_for(web_id: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::for_web_id(web_id),
            ..Self::default()
        }
    }
}
