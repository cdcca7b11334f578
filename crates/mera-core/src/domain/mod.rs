//! Domain entities and business logic
//!
//! This module contains the core domain types for Mera:
//! - The `Bundle` progress document and its sections
//! - The backup filename grammar
//! - Small validated value types (`TimestampedField`, `SessionId`, `Sink`)
//! - Domain-specific error types

pub mod bundle;
pub mod errors;
pub mod filename;
pub mod newtypes;

pub use bundle::{
    Bundle, CombinedComponentProgress, CompletionEntry, ComponentProgress, FocusIndicatorStyle,
    FontSize, LearningPace, Metadata, NavigationState, OverallProgress, Settings, Theme,
    WeekStartDay, WeekStartTimeUtc, SETTINGS_FIELD_COUNT,
};
pub use errors::CoreError;
pub use filename::{BackupFilename, BackupKind};
pub use newtypes::{SessionId, Sink, TimestampedField};
