//! Save Orchestrator (G)
//!
//! Four sequential stages, each writing a primary/duplicate pair in
//! parallel with a save-load-verify-delete protocol. Exact string equality
//! on read-back is the integrity check - no hashing, since the bytes are
//! a JSON string round-tripping through the same `StorageBridge` that
//! wrote them.

use std::sync::Arc;

use mera_core::domain::{BackupFilename, BackupKind, Sink};
use mera_core::ports::StorageBridge;

/// The result of one `orchestrate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    BothSucceeded,
    OnlyLocalSucceeded,
    OnlySolidSucceeded,
    BothFailed,
}

impl std::fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SaveOutcome::BothSucceeded => "both_succeeded",
            SaveOutcome::OnlyLocalSucceeded => "only_local_succeeded",
            SaveOutcome::OnlySolidSucceeded => "only_solid_succeeded",
            SaveOutcome::BothFailed => "both_failed",
        };
        write!(f, "{s}")
    }
}

/// Writes `contents` to `filename`, reads it back, and verifies exact
/// string equality, deleting the file on mismatch. Returns whether the
/// pair member verified.
async fn write_verified(bridge: &dyn StorageBridge, sink: Sink, filename: &BackupFilename, contents: &str) -> bool {
    let key = filename.to_string();
    if let Err(err) = bridge.save(sink, &key, contents.to_string()).await {
        tracing::warn!(filename = %key, error = %err, "save failed");
        return false;
    }
    match bridge.load(sink, &key).await {
        Ok(read_back) if read_back == contents => true,
        Ok(_) => {
            tracing::warn!(filename = %key, "read-back mismatch, deleting");
            if let Err(err) = bridge.delete(sink, &key).await {
                tracing::warn!(filename = %key, error = %err, "failed to delete mismatched save");
            }
            false
        }
        Err(err) => {
            tracing::warn!(filename = %key, error = %err, "read-back failed");
            false
        }
    }
}

/// Writes a primary/duplicate pair in parallel; the stage is "ok" only if
/// both members verify.
async fn write_verified_pair(
    bridge: &dyn StorageBridge,
    sink: Sink,
    primary: &BackupFilename,
    duplicate: &BackupFilename,
    contents: &str,
) -> bool {
    let (primary_ok, duplicate_ok) = tokio::join!(
        write_verified(bridge, sink, primary, contents),
        write_verified(bridge, sink, duplicate, contents),
    );
    primary_ok && duplicate_ok
}

/// Runs the four-stage save protocol for one save cycle.
///
/// `allow_pod` gates Stage 2 (and therefore Stage 3, which only runs if
/// Stage 2 succeeded) - the caller is expected to pass `false` whenever
/// the concurrent-session tripwire did not return `Passed` this tick.
pub async fn orchestrate(
    bridge: Arc<dyn StorageBridge>,
    schema_version: (u32, u32, u32),
    bundle_json: &str,
    ts: i64,
    allow_pod: bool,
) -> SaveOutcome {
    let (lofp, lofd) =
        BackupFilename::save_protocol_pair(schema_version, ts, BackupKind::LocalOfflinePrimary, BackupKind::LocalOfflineDuplicate);
    let stage1_ok = write_verified_pair(bridge.as_ref(), Sink::Local, &lofp, &lofd, bundle_json).await;

    let stage2_ok = if allow_pod {
        let (sp, sd) = BackupFilename::save_protocol_pair(schema_version, ts, BackupKind::PodPrimary, BackupKind::PodDuplicate);
        write_verified_pair(bridge.as_ref(), Sink::Pod, &sp, &sd, bundle_json).await
    } else {
        false
    };

    let stage3_ok = if stage2_ok {
        let (lonp, lond) =
            BackupFilename::save_protocol_pair(schema_version, ts, BackupKind::LocalOnlinePrimary, BackupKind::LocalOnlineDuplicate);
        write_verified_pair(bridge.as_ref(), Sink::Local, &lonp, &lond, bundle_json).await
    } else {
        false
    };

    if stage1_ok && stage2_ok && stage3_ok {
        for filename in [&lofp, &lofd] {
            if let Err(err) = bridge.delete(Sink::Local, &filename.to_string()).await {
                tracing::debug!(filename = %filename, error = %err, "cleanup delete failed, non-fatal");
            }
        }
    }

    match (stage1_ok, stage2_ok, stage3_ok) {
        (true, true, true) => SaveOutcome::BothSucceeded,
        (true, true, false) => SaveOutcome::OnlySolidSucceeded,
        (true, false, _) => SaveOutcome::OnlyLocalSucceeded,
        (false, true, true) => SaveOutcome::BothSucceeded,
        (false, true, false) => SaveOutcome::OnlySolidSucceeded,
        (false, false, _) => SaveOutcome::BothFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mera_core::testing::InMemoryStorageBridge;

    #[tokio::test]
    async fn test_full_success_is_both_succeeded() {
        let bridge: Arc<dyn StorageBridge> = Arc::new(InMemoryStorageBridge::new());
        let outcome = orchestrate(bridge.clone(), (1, 0, 0), "{}", 1000, true).await;
        assert_eq!(outcome, SaveOutcome::BothSucceeded);
        assert_eq!(bridge.key_count(Sink::Local), 2);
        assert_eq!(bridge.key_count(Sink::Pod), 2);
    }

    #[tokio::test]
    async fn test_cleanup_deletes_offline_pair_on_full_success() {
        let bridge = Arc::new(InMemoryStorageBridge::new());
        orchestrate(bridge.clone(), (1, 0, 0), "{}", 1000, true).await;
        let (lofp, lofd) = BackupFilename::save_protocol_pair(
            (1, 0, 0),
            1000,
            BackupKind::LocalOfflinePrimary,
            BackupKind::LocalOfflineDuplicate,
        );
        assert!(!bridge.contains(Sink::Local, &lofp.to_string()));
        assert!(!bridge.contains(Sink::Local, &lofd.to_string()));
    }

    #[tokio::test]
    async fn test_pod_disallowed_yields_only_local_succeeded() {
        let bridge: Arc<dyn StorageBridge> = Arc::new(InMemoryStorageBridge::new());
        let outcome = orchestrate(bridge, (1, 0, 0), "{}", 1000, false).await;
        assert_eq!(outcome, SaveOutcome::OnlyLocalSucceeded);
    }

    #[tokio::test]
    async fn test_pod_duplicate_write_failure_yields_only_local_succeeded() {
        let bridge = Arc::new(InMemoryStorageBridge::new());
        bridge.fail_next_save_on(Sink::Pod);
        let outcome = orchestrate(bridge, (1, 0, 0), "{}", 1000, true).await;
        assert_eq!(outcome, SaveOutcome::OnlyLocalSucceeded);
    }

    #[tokio::test]
    async fn test_local_failure_with_pod_success_yields_only_solid_succeeded() {
        let bridge = Arc::new(InMemoryStorageBridge::new());
        bridge.fail_all_saves_on(Sink::Local);
        let outcome = orchestrate(bridge, (1, 0, 0), "{}", 1000, true).await;
        assert_eq!(outcome, SaveOutcome::OnlySolidSucceeded);
    }

    #[tokio::test]
    async fn test_everything_fails_yields_both_failed() {
        let bridge = Arc::new(InMemoryStorageBridge::new());
        bridge.fail_next_save_on(Sink::Local);
        bridge.fail_next_save_on(Sink::Pod);
        let outcome = orchestrate(bridge, (1, 0, 0), "{}", 1000, true).await;
        assert_eq!(outcome, SaveOutcome::BothFailed);
    }
}
