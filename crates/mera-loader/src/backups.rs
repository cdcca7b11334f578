//! Backup enumeration (§4.7 steps 2-3)
//!
//! Lists every backup of a set of kinds from one sink, parses filenames,
//! discards anything malformed, and sorts newest-first - the order every
//! later step (scoring, escape-hatch rate limiting) relies on.

use mera_core::domain::{BackupFilename, BackupKind, Sink};
use mera_core::ports::{StorageBridge, StorageError};

/// Lists and parses every backup of any of `kinds` in `sink`, newest-first.
///
/// Malformed filenames (ones that don't match the backup grammar) are
/// silently dropped rather than surfaced - a backup namespace can
/// accumulate unrelated files over time and this system only cares about
/// its own.
pub async fn list_backups(
    bridge: &dyn StorageBridge,
    sink: Sink,
    kinds: &[BackupKind],
) -> Result<Vec<BackupFilename>, StorageError> {
    let mut parsed = Vec::new();
    for &kind in kinds {
        let glob = BackupFilename::glob_any_version(kind);
        let names = bridge.list(sink, &glob).await?;
        for name in names {
            if let Ok(filename) = BackupFilename::try_from(name.as_str()) {
                parsed.push(filename);
            }
        }
    }
    parsed.sort();
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mera_core::testing::InMemoryStorageBridge;

    #[tokio::test]
    async fn test_lists_and_sorts_newest_first() {
        let bridge = InMemoryStorageBridge::new();
        bridge
            .save(Sink::Pod, "mera.1.0.0.sp.100.json", "a".to_string())
            .await
            .unwrap();
        bridge
            .save(Sink::Pod, "mera.1.0.0.sp.300.json", "b".to_string())
            .await
            .unwrap();
        bridge
            .save(Sink::Pod, "mera.1.0.0.sd.200.json", "c".to_string())
            .await
            .unwrap();

        let found = list_backups(&bridge, Sink::Pod, &[BackupKind::PodPrimary, BackupKind::PodDuplicate])
            .await
            .unwrap();

        let timestamps: Vec<i64> = found.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(timestamps, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn test_ignores_malformed_names() {
        let bridge = InMemoryStorageBridge::new();
        bridge.save(Sink::Local, "not-a-backup.json", "x".to_string()).await.unwrap();
        let found = list_backups(&bridge, Sink::Local, &[BackupKind::LocalOfflinePrimary]).await.unwrap();
        assert!(found.is_empty());
    }
}
