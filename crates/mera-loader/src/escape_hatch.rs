//! Escape Hatch (E)
//!
//! Writes a verbatim, pre-sanitization snapshot of the raw Pod bytes the
//! loader was about to merge or otherwise discard detail from, so a buggy
//! release can be forensically recovered from later. Rate-limited and
//! bounded in count; every failure here is logged, never propagated -
//! the caller always fires this as a detached task (`tokio::spawn`).

use mera_core::domain::{BackupFilename, BackupKind, Sink};
use mera_core::ports::{Clock, StorageBridge, StorageError};

use crate::backups::list_backups;

/// Writes `raw_pod_json` verbatim to a new `.ehb.` backup, unless the
/// newest existing one is still within the rate-limit window. Prunes the
/// oldest overflow if the post-write count exceeds `max_backups`.
pub async fn make_escape_hatch(
    bridge: &dyn StorageBridge,
    clock: &dyn Clock,
    schema_version: (u32, u32, u32),
    rate_limit_ms: i64,
    max_backups: usize,
    raw_pod_json: &str,
) -> Result<(), StorageError> {
    let existing = list_backups(bridge, Sink::Pod, &[BackupKind::EscapeHatchBackup]).await?;

    if let Some(newest) = existing.first() {
        let age = clock.now_ms() - newest.timestamp_ms;
        if age < rate_limit_ms {
            tracing::debug!(age_ms = age, rate_limit_ms, "escape hatch rate-limited, skipping");
            return Ok(());
        }
    }

    let (major, minor, patch) = schema_version;
    let filename = BackupFilename::new(major, minor, patch, BackupKind::EscapeHatchBackup, clock.now_ms());
    bridge.save(Sink::Pod, &filename.to_string(), raw_pod_json.to_string()).await?;
    tracing::info!(filename = %filename, "wrote escape-hatch snapshot");

    let mut all = list_backups(bridge, Sink::Pod, &[BackupKind::EscapeHatchBackup]).await?;
    all.sort();
    for overflow in all.iter().skip(max_backups) {
        if let Err(err) = bridge.delete(Sink::Pod, &overflow.to_string()).await {
            tracing::warn!(filename = %overflow, error = %err, "failed to prune overflow escape-hatch backup");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mera_core::ports::FixedClock;
    use mera_core::testing::InMemoryStorageBridge;

    #[tokio::test]
    async fn test_writes_snapshot_when_no_prior_backup() {
        let bridge = InMemoryStorageBridge::new();
        let clock = FixedClock::new(1_000_000);
        make_escape_hatch(&bridge, &clock, (1, 0, 0), 3_600_000, 20, "raw-bytes")
            .await
            .unwrap();
        assert_eq!(bridge.key_count(Sink::Pod), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_within_one_hour() {
        let bridge = InMemoryStorageBridge::new();
        let clock = FixedClock::new(0);
        make_escape_hatch(&bridge, &clock, (1, 0, 0), 3_600_000, 20, "first").await.unwrap();
        clock.advance(1_000);
        make_escape_hatch(&bridge, &clock, (1, 0, 0), 3_600_000, 20, "second").await.unwrap();
        assert_eq!(bridge.key_count(Sink::Pod), 1);
    }

    #[tokio::test]
    async fn test_writes_again_after_rate_limit_expires() {
        let bridge = InMemoryStorageBridge::new();
        let clock = FixedClock::new(0);
        make_escape_hatch(&bridge, &clock, (1, 0, 0), 3_600_000, 20, "first").await.unwrap();
        clock.advance(3_600_001);
        make_escape_hatch(&bridge, &clock, (1, 0, 0), 3_600_000, 20, "second").await.unwrap();
        assert_eq!(bridge.key_count(Sink::Pod), 2);
    }

    #[tokio::test]
    async fn test_prunes_oldest_overflow_beyond_cap() {
        let bridge = InMemoryStorageBridge::new();
        let clock = FixedClock::new(0);
        for i in 0..5 {
            make_escape_hatch(&bridge, &clock, (1, 0, 0), 0, 3, &format!("snapshot-{i}"))
                .await
                .unwrap();
            clock.advance(1);
        }
        assert_eq!(bridge.key_count(Sink::Pod), 3);
        let remaining = list_backups(&bridge, Sink::Pod, &[BackupKind::EscapeHatchBackup]).await.unwrap();
        let newest_timestamps: Vec<i64> = remaining.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(newest_timestamps, vec![4, 3, 2]);
    }
}
