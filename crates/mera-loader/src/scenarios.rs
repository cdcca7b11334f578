//! Recovery scenario classification (§4.7.4)
//!
//! One of six labels describing the shape of the result `load` produced,
//! reported to the caller for optional UI messaging - the core itself
//! never decides what to tell the user, only how to characterize what
//! happened.

/// How the Progress Loader's final result should be characterized to the
/// embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryScenario {
    /// The chosen backup was perfectly valid and no merge was needed.
    PerfectRecovery,
    /// The chosen (possibly merged) result still reports counter corruption.
    ImperfectRecoveryCorruption,
    /// The chosen result is imperfect but clean - curriculum evolution or
    /// ordinary defaulting, not data loss.
    ImperfectRecoveryMigration,
    /// No backups exist anywhere for this user.
    DefaultNoSaves,
    /// Backups exist but every one was disqualified by a web id mismatch.
    DefaultWebIdMismatch,
    /// Backups exist but every one failed to load or parse.
    DefaultFailedRecovery,
}

impl std::fmt::Display for RecoveryScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryScenario::PerfectRecovery => "perfect_recovery",
            RecoveryScenario::ImperfectRecoveryCorruption => "imperfect_recovery_corruption",
            RecoveryScenario::ImperfectRecoveryMigration => "imperfect_recovery_migration",
            RecoveryScenario::DefaultNoSaves => "default_no_saves",
            RecoveryScenario::DefaultWebIdMismatch => "default_web_id_mismatch",
            RecoveryScenario::DefaultFailedRecovery => "default_failed_recovery",
        };
        write!(f, "{s}")
    }
}

/// Classifies the no-backup-selected case from what scoring observed
/// (§4.7.2's "no bestPod and no bestLocal" branch).
pub fn classify_no_selection(
    total_backups: usize,
    had_web_id_mismatch: bool,
    had_load_failures: bool,
) -> RecoveryScenario {
    if total_backups == 0 {
        RecoveryScenario::DefaultNoSaves
    } else if had_web_id_mismatch && !had_load_failures {
        RecoveryScenario::DefaultWebIdMismatch
    } else {
        RecoveryScenario::DefaultFailedRecovery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_backups_is_default_no_saves() {
        assert_eq!(classify_no_selection(0, false, false), RecoveryScenario::DefaultNoSaves);
    }

    #[test]
    fn test_all_web_id_mismatch() {
        assert_eq!(classify_no_selection(3, true, false), RecoveryScenario::DefaultWebIdMismatch);
    }

    #[test]
    fn test_load_failures_win_over_mismatch_when_both_seen() {
        assert_eq!(classify_no_selection(3, true, true), RecoveryScenario::DefaultFailedRecovery);
    }

    #[test]
    fn test_load_failures_only() {
        assert_eq!(classify_no_selection(2, false, true), RecoveryScenario::DefaultFailedRecovery);
    }
}
