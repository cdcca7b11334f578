//! Configuration for the Mera progress core
//!
//! Every interval, threshold, and weight named throughout the specification
//! lives here rather than as a scattered literal, so an embedding
//! application can tune retention and scoring behavior without touching
//! the subsystems themselves.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tuning knobs for the Save Manager's poll loop (§4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveManagerConfig {
    /// How often the manager checks whether a save is due, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for SaveManagerConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 50 }
    }
}

/// Tuning knobs for the session-protection tripwire (§4.3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTripwireConfig {
    /// Exponential backoff schedule, in milliseconds, for the initial
    /// session-protection file write.
    pub backoff_schedule_ms: Vec<u64>,
    /// How long to wait after writing before reading the file back.
    pub read_back_delay_ms: u64,
}

impl Default for SessionTripwireConfig {
    fn default() -> Self {
        Self {
            backoff_schedule_ms: vec![50, 100, 200, 400, 800],
            read_back_delay_ms: 50,
        }
    }
}

/// Tuning knobs for the Save Cleaner's retention policy (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveCleanerConfig {
    /// How often the cleaner runs a retention pass, in seconds.
    pub interval_secs: u64,
    /// The minimum number of primaries a sink must retain; the cleaner
    /// never deletes below this floor.
    pub min_retention: usize,
    /// Bracket boundary: anything younger is "recent" and never deleted.
    pub recent_threshold_ms: i64,
    /// Bracket boundary between "recent" and "ten_min".
    pub ten_min_threshold_ms: i64,
    /// Bracket boundary between "ten_min" and "hour".
    pub hour_threshold_ms: i64,
    /// Bracket boundary between "hour" and "day"; beyond this is "ancient".
    pub day_threshold_ms: i64,
}

impl Default for SaveCleanerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            min_retention: 4,
            recent_threshold_ms: 60_000,
            ten_min_threshold_ms: 10 * 60_000,
            hour_threshold_ms: 60 * 60_000,
            day_threshold_ms: 24 * 60 * 60_000,
        }
    }
}

/// Scoring weights the Progress Loader uses to rank candidate backups (§4.7.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Selection threshold below which a Pod backup is used without
    /// consulting the local side at all.
    pub quality_threshold: u32,
    pub weight_lessons_lost: u32,
    pub weight_items_dropped: u32,
    pub settings_defaulted_baseline: u32,
    pub settings_defaulted_proportional: u32,
    pub weight_component_defaulted: u32,
    pub weight_backup_index: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 1000,
            weight_lessons_lost: 20_000,
            weight_items_dropped: 1000,
            settings_defaulted_baseline: 1000,
            settings_defaulted_proportional: 4000,
            weight_component_defaulted: 5,
            weight_backup_index: 500,
        }
    }
}

/// Tuning knobs for the Escape Hatch (§4.7.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeHatchConfig {
    /// Minimum age, in milliseconds, the newest `.ehb.` snapshot must reach
    /// before another one is written.
    pub rate_limit_ms: i64,
    /// Maximum number of `.ehb.` snapshots to retain before pruning the oldest.
    pub max_backups: usize,
}

impl Default for EscapeHatchConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 60 * 60_000,
            max_backups: 20,
        }
    }
}

/// Precondition the embedding application checks before starting the core (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSkewConfig {
    /// Maximum allowed absolute skew, in milliseconds, against a trusted
    /// HTTP `Date` header before the application refuses to start.
    pub max_skew_ms: i64,
}

impl Default for ClockSkewConfig {
    fn default() -> Self {
        Self { max_skew_ms: 60_000 }
    }
}

/// The schema version embedded in every backup filename this process writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self { major: 1, minor: 0, patch: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    pub schema_version: SchemaVersion,
    pub save_manager: SaveManagerConfig,
    pub session_tripwire: SessionTripwireConfig,
    pub save_cleaner: SaveCleanerConfig,
    pub loader: LoaderConfig,
    pub escape_hatch: EscapeHatchConfig,
    pub clock_skew: ClockSkewConfig,
}

/// A single configuration validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Loads configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration from `path`, falling back to defaults if the
    /// file is missing or fails to parse. Parse failures are logged.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// The conventional config file location, `$XDG_CONFIG_HOME/mera/config.yaml`
    /// (or `~/.config/mera/config.yaml` if unset).
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("mera").join("config.yaml")
    }

    /// Validates internal consistency of the configuration, returning every
    /// violation found rather than stopping at the first.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.save_manager.poll_interval_ms == 0 {
            errors.push(ValidationError {
                field: "save_manager.poll_interval_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.save_cleaner.min_retention < 1 {
            errors.push(ValidationError {
                field: "save_cleaner.min_retention".to_string(),
                message: "must retain at least one primary".to_string(),
            });
        }

        let c = &self.save_cleaner;
        if !(c.recent_threshold_ms < c.ten_min_threshold_ms
            && c.ten_min_threshold_ms < c.hour_threshold_ms
            && c.hour_threshold_ms < c.day_threshold_ms)
        {
            errors.push(ValidationError {
                field: "save_cleaner".to_string(),
                message: "bracket thresholds must be strictly increasing".to_string(),
            });
        }

        if self.session_tripwire.backoff_schedule_ms.is_empty() {
            errors.push(ValidationError {
                field: "session_tripwire.backoff_schedule_ms".to_string(),
                message: "must contain at least one attempt".to_string(),
            });
        }

        if self.escape_hatch.max_backups == 0 {
            errors.push(ValidationError {
                field: "escape_hatch.max_backups".to_string(),
                message: "must retain at least one escape-hatch backup".to_string(),
            });
        }

        if self.clock_skew.max_skew_ms < 0 {
            errors.push(ValidationError {
                field: "clock_skew.max_skew_ms".to_string(),
                message: "must be non-negative".to_string(),
            });
        }

        errors
    }
}

/// Builder for constructing a `Config` with overrides, validating at the end.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval_ms(mut self, value: u64) -> Self {
        self.config.save_manager.poll_interval_ms = value;
        self
    }

    pub fn cleaner_interval_secs(mut self, value: u64) -> Self {
        self.config.save_cleaner.interval_secs = value;
        self
    }

    pub fn min_retention(mut self, value: usize) -> Self {
        self.config.save_cleaner.min_retention = value;
        self
    }

    pub fn quality_threshold(mut self, value: u32) -> Self {
        self.config.loader.quality_threshold = value;
        self
    }

    pub fn schema_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.config.schema_version = SchemaVersion { major, minor, patch };
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    /// Builds and validates, returning every violation instead of the config
    /// if any field is inconsistent.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.config;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn test_zero_poll_interval_is_invalid() {
        let config = ConfigBuilder::new().poll_interval_ms(0).build();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "save_manager.poll_interval_ms"));
    }

    #[test]
    fn test_zero_min_retention_is_invalid() {
        let config = ConfigBuilder::new().min_retention(0).build();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "save_cleaner.min_retention"));
    }

    #[test]
    fn test_build_validated_ok() {
        let config = ConfigBuilder::new().quality_threshold(500).build_validated();
        assert!(config.is_ok());
    }

    #[test]
    fn test_build_validated_err() {
        let result = ConfigBuilder::new().poll_interval_ms(0).build_validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_falls_back_on_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/mera/config.yaml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let config = ConfigBuilder::new().poll_interval_ms(25).build();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = ConfigBuilder::new().poll_interval_ms(10).build();
        std::fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
