//! Backup filename grammar
//!
//! `mera.<major>.<minor>.<patch>.<kind>.<unix-ms>.json`
//!
//! Every backup the system ever writes - save-protocol primaries and
//! duplicates, escape-hatch snapshots - is named with this grammar. Schema
//! version travels in the filename, never inside the JSON payload, so a
//! backup can be triaged without parsing its contents.

use std::cmp::Ordering;
use std::fmt;

use super::errors::CoreError;

/// The seven distinct roles a backup file can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupKind {
    /// Pod primary ("sp")
    PodPrimary,
    /// Pod duplicate ("sd")
    PodDuplicate,
    /// Local offline-work primary ("lofp")
    LocalOfflinePrimary,
    /// Local offline-work duplicate ("lofd")
    LocalOfflineDuplicate,
    /// Local online primary ("lonp")
    LocalOnlinePrimary,
    /// Local online duplicate ("lond")
    LocalOnlineDuplicate,
    /// Escape-hatch backup ("ehb")
    EscapeHatchBackup,
}

impl BackupKind {
    pub fn as_token(self) -> &'static str {
        match self {
            BackupKind::PodPrimary => "sp",
            BackupKind::PodDuplicate => "sd",
            BackupKind::LocalOfflinePrimary => "lofp",
            BackupKind::LocalOfflineDuplicate => "lofd",
            BackupKind::LocalOnlinePrimary => "lonp",
            BackupKind::LocalOnlineDuplicate => "lond",
            BackupKind::EscapeHatchBackup => "ehb",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "sp" => BackupKind::PodPrimary,
            "sd" => BackupKind::PodDuplicate,
            "lofp" => BackupKind::LocalOfflinePrimary,
            "lofd" => BackupKind::LocalOfflineDuplicate,
            "lonp" => BackupKind::LocalOnlinePrimary,
            "lond" => BackupKind::LocalOnlineDuplicate,
            "ehb" => BackupKind::EscapeHatchBackup,
            _ => return None,
        })
    }

    /// True for `.lofp.`/`.lofd.` - the "offline work" tag the loader checks
    /// when deciding whether a local backup represents unsynced offline edits.
    pub fn is_offline_tag(self) -> bool {
        matches!(
            self,
            BackupKind::LocalOfflinePrimary | BackupKind::LocalOfflineDuplicate
        )
    }

    pub fn is_primary(self) -> bool {
        matches!(
            self,
            BackupKind::PodPrimary | BackupKind::LocalOfflinePrimary | BackupKind::LocalOnlinePrimary
        )
    }

    pub fn is_duplicate(self) -> bool {
        matches!(
            self,
            BackupKind::PodDuplicate | BackupKind::LocalOfflineDuplicate | BackupKind::LocalOnlineDuplicate
        )
    }
}

/// A parsed, validated backup filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackupFilename {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub kind: BackupKind,
    pub timestamp_ms: i64,
}

impl BackupFilename {
    pub fn new(major: u32, minor: u32, patch: u32, kind: BackupKind, timestamp_ms: i64) -> Self {
        Self {
            major,
            minor,
            patch,
            kind,
            timestamp_ms,
        }
    }

    /// A `StorageBridge::list` glob matching every backup of `kind` at
    /// `version`, regardless of timestamp. One `*` wildcard, matching the
    /// single-wildcard contract every `StorageBridge` implementation honors.
    pub fn glob_for(version: (u32, u32, u32), kind: BackupKind) -> String {
        let (major, minor, patch) = version;
        format!("mera.{major}.{minor}.{patch}.{}.*.json", kind.as_token())
    }

    /// A glob matching every backup of `kind` regardless of schema version
    /// or timestamp. Used by the loader and cleaner, which must see backups
    /// written by any process version, not just the one currently running.
    pub fn glob_any_version(kind: BackupKind) -> String {
        format!("mera.*.*.*.{}.*.json", kind.as_token())
    }

    /// Builds a save-protocol pair's filenames for one orchestrator cycle.
    pub fn save_protocol_pair(
        version: (u32, u32, u32),
        timestamp_ms: i64,
        primary: BackupKind,
        duplicate: BackupKind,
    ) -> (Self, Self) {
        let (major, minor, patch) = version;
        (
            Self::new(major, minor, patch, primary, timestamp_ms),
            Self::new(major, minor, patch, duplicate, timestamp_ms),
        )
    }
}

impl fmt::Display for BackupFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mera.{}.{}.{}.{}.{}.json",
            self.major,
            self.minor,
            self.patch,
            self.kind.as_token(),
            self.timestamp_ms
        )
    }
}

impl TryFrom<&str> for BackupFilename {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let err = || CoreError::InvalidFilename(value.to_string());

        let stripped = value.strip_suffix(".json").ok_or_else(err)?;
        let parts: Vec<&str> = stripped.split('.').collect();
        if parts.len() != 6 || parts[0] != "mera" {
            return Err(err());
        }
        let major = parts[1].parse::<u32>().map_err(|_| err())?;
        let minor = parts[2].parse::<u32>().map_err(|_| err())?;
        let patch = parts[3].parse::<u32>().map_err(|_| err())?;
        let kind = BackupKind::from_token(parts[4]).ok_or_else(err)?;
        let timestamp_ms = parts[5].parse::<i64>().map_err(|_| err())?;

        Ok(Self {
            major,
            minor,
            patch,
            kind,
            timestamp_ms,
        })
    }
}

/// Orders filenames newest-first, the order every enumeration in this
/// system (loader scoring, cleaner bracketing) relies on.
impl PartialOrd for BackupFilename {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BackupFilename {
    fn cmp(&self, other: &Self) -> Ordering {
        other.timestamp_ms.cmp(&self.timestamp_ms)
    }
}
