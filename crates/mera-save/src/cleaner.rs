//! Save Cleaner (I)
//!
//! A second, simpler timer loop alongside the Save Manager's: no channel,
//! just a `tokio::time::interval` tick driving a retention pass per sink.
//! Bracket classification is kept as a small pure function next to the
//! stateful sweep, in the same spirit as the teacher's preference for
//! classifier functions living beside the code that calls them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mera_core::config::SaveCleanerConfig;
use mera_core::domain::{BackupFilename, BackupKind, Sink};
use mera_core::ports::{Clock, StorageBridge};
use mera_telemetry::MetricsRegistry;

/// The five age buckets a primary backup falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bracket {
    Recent,
    TenMin,
    Hour,
    Day,
    Ancient,
}

impl std::fmt::Display for Bracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Bracket::Recent => "recent",
            Bracket::TenMin => "ten_min",
            Bracket::Hour => "hour",
            Bracket::Day => "day",
            Bracket::Ancient => "ancient",
        };
        write!(f, "{s}")
    }
}

/// Classifies `age_ms` into a bracket using the configured thresholds.
pub fn bracket_of(age_ms: i64, config: &SaveCleanerConfig) -> Bracket {
    if age_ms < config.recent_threshold_ms {
        Bracket::Recent
    } else if age_ms <= config.ten_min_threshold_ms {
        Bracket::TenMin
    } else if age_ms <= config.hour_threshold_ms {
        Bracket::Hour
    } else if age_ms <= config.day_threshold_ms {
        Bracket::Day
    } else {
        Bracket::Ancient
    }
}

fn duplicate_kind_for(primary: BackupKind) -> Option<BackupKind> {
    match primary {
        BackupKind::PodPrimary => Some(BackupKind::PodDuplicate),
        BackupKind::LocalOfflinePrimary => Some(BackupKind::LocalOfflineDuplicate),
        BackupKind::LocalOnlinePrimary => Some(BackupKind::LocalOnlineDuplicate),
        _ => None,
    }
}

/// A unified view of "primaries" for one sink - Local unifies `lofp` and
/// `lonp` into one population, Pod has only `sp`.
async fn list_primaries(bridge: &dyn StorageBridge, sink: Sink, primary_kinds: &[BackupKind]) -> Vec<BackupFilename> {
    let mut found = Vec::new();
    for &kind in primary_kinds {
        let glob = BackupFilename::glob_any_version(kind);
        match bridge.list(sink, &glob).await {
            Ok(names) => {
                for name in names {
                    if let Ok(filename) = BackupFilename::try_from(name.as_str()) {
                        found.push(filename);
                    }
                }
            }
            Err(err) => tracing::warn!(?sink, error = %err, "failed to list primaries"),
        }
    }
    found.sort();
    found
}

/// Bucket primaries by bracket, newest-first within each bucket (the input
/// is already newest-first overall, so this preserves that order).
fn bucket(primaries: Vec<BackupFilename>, now_ms: i64, config: &SaveCleanerConfig) -> HashMap<Bracket, Vec<BackupFilename>> {
    let mut buckets: HashMap<Bracket, Vec<BackupFilename>> = HashMap::new();
    for filename in primaries {
        let age = now_ms - filename.timestamp_ms;
        buckets.entry(bracket_of(age, config)).or_default().push(filename);
    }
    buckets
}

/// Runs §4.4 step 4's conditional consolidation, returning the set of
/// primaries to delete tagged with the bracket they were deleted from.
fn consolidation_targets(buckets: &HashMap<Bracket, Vec<BackupFilename>>) -> Vec<(Bracket, BackupFilename)> {
    let mut targets = Vec::new();
    let empty = Vec::new();
    let get = |b: Bracket| buckets.get(&b).unwrap_or(&empty);
    let tagged = |bracket: Bracket, skip: usize| get(bracket).iter().skip(skip).map(move |f| (bracket, f.clone()));

    if !get(Bracket::Day).is_empty() {
        targets.extend(tagged(Bracket::Ancient, 0));
    }
    if !get(Bracket::Hour).is_empty() {
        targets.extend(tagged(Bracket::Day, 1));
    }
    if !get(Bracket::TenMin).is_empty() {
        targets.extend(tagged(Bracket::Hour, 1));
    }
    if !get(Bracket::Recent).is_empty() {
        targets.extend(tagged(Bracket::TenMin, 1));
    }
    targets
}

/// Deletes a primary and its derived duplicate as one unit, re-confirming
/// retention floor before each deletion.
#[allow(clippy::too_many_arguments)]
async fn delete_primary_and_duplicate(
    bridge: &dyn StorageBridge,
    sink: Sink,
    bracket: Bracket,
    primary: &BackupFilename,
    primary_kinds: &[BackupKind],
    min_retention: usize,
    metrics: Option<&MetricsRegistry>,
) -> bool {
    let remaining = list_primaries(bridge, sink, primary_kinds).await;
    if remaining.len() <= min_retention {
        return false;
    }

    if let Err(err) = bridge.delete(sink, &primary.to_string()).await {
        tracing::warn!(filename = %primary, error = %err, "failed to delete primary");
    }

    if let Some(duplicate_kind) = duplicate_kind_for(primary.kind) {
        let duplicate = BackupFilename::new(primary.major, primary.minor, primary.patch, duplicate_kind, primary.timestamp_ms);
        if let Err(err) = bridge.delete(sink, &duplicate.to_string()).await {
            tracing::debug!(filename = %duplicate, error = %err, "failed to delete duplicate, non-fatal");
        }
    }
    if let Some(metrics) = metrics {
        metrics.record_cleaner_deletion(&sink.to_string(), &bracket.to_string());
    }
    true
}

/// Deletes duplicates older than 24h whose primary fails to load.
async fn sweep_orphans(
    bridge: &dyn StorageBridge,
    sink: Sink,
    duplicate_kinds: &[(BackupKind, BackupKind)],
    now_ms: i64,
) {
    const ORPHAN_AGE_MS: i64 = 24 * 60 * 60_000;

    for &(primary_kind, duplicate_kind) in duplicate_kinds {
        let glob = BackupFilename::glob_any_version(duplicate_kind);
        let names = match bridge.list(sink, &glob).await {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(?sink, error = %err, "failed to list duplicates for orphan sweep");
                continue;
            }
        };

        for name in names {
            let Ok(duplicate) = BackupFilename::try_from(name.as_str()) else {
                continue;
            };
            if now_ms - duplicate.timestamp_ms < ORPHAN_AGE_MS {
                continue;
            }
            let primary = BackupFilename::new(duplicate.major, duplicate.minor, duplicate.patch, primary_kind, duplicate.timestamp_ms);
            if bridge.load(sink, &primary.to_string()).await.is_err() {
                if let Err(err) = bridge.delete(sink, &duplicate.to_string()).await {
                    tracing::warn!(filename = %duplicate, error = %err, "failed to delete orphan duplicate");
                }
            }
        }
    }
}

/// Runs one retention pass over the Pod sink (`sp`/`sd`).
async fn clean_pod(bridge: &dyn StorageBridge, now_ms: i64, config: &SaveCleanerConfig, metrics: Option<&MetricsRegistry>) {
    let primary_kinds = [BackupKind::PodPrimary];
    let primaries = list_primaries(bridge, Sink::Pod, &primary_kinds).await;
    if primaries.len() > config.min_retention {
        let buckets = bucket(primaries, now_ms, config);
        for (bracket, target) in consolidation_targets(&buckets) {
            delete_primary_and_duplicate(bridge, Sink::Pod, bracket, &target, &primary_kinds, config.min_retention, metrics).await;
        }
    }
    sweep_orphans(bridge, Sink::Pod, &[(BackupKind::PodPrimary, BackupKind::PodDuplicate)], now_ms).await;
}

/// Runs one retention pass over the Local sink, unifying `lofp`+`lonp` as
/// one "primaries" population per §4.4.
async fn clean_local(bridge: &dyn StorageBridge, now_ms: i64, config: &SaveCleanerConfig, metrics: Option<&MetricsRegistry>) {
    let primary_kinds = [BackupKind::LocalOfflinePrimary, BackupKind::LocalOnlinePrimary];
    let primaries = list_primaries(bridge, Sink::Local, &primary_kinds).await;
    if primaries.len() > config.min_retention {
        let buckets = bucket(primaries, now_ms, config);
        for (bracket, target) in consolidation_targets(&buckets) {
            delete_primary_and_duplicate(bridge, Sink::Local, bracket, &target, &primary_kinds, config.min_retention, metrics).await;
        }
    }
    sweep_orphans(
        bridge,
        Sink::Local,
        &[
            (BackupKind::LocalOfflinePrimary, BackupKind::LocalOfflineDuplicate),
            (BackupKind::LocalOnlinePrimary, BackupKind::LocalOnlineDuplicate),
        ],
        now_ms,
    )
    .await;
}

/// Runs one retention pass across both sinks.
pub async fn run_once(bridge: &dyn StorageBridge, clock: &dyn Clock, config: &SaveCleanerConfig) {
    run_once_with_metrics(bridge, clock, config, None).await;
}

async fn run_once_with_metrics(bridge: &dyn StorageBridge, clock: &dyn Clock, config: &SaveCleanerConfig, metrics: Option<&MetricsRegistry>) {
    let now_ms = clock.now_ms();
    clean_pod(bridge, now_ms, config, metrics).await;
    clean_local(bridge, now_ms, config, metrics).await;
}

/// The singleton retention-pass timer.
pub struct SaveCleaner {
    bridge: Arc<dyn StorageBridge>,
    clock: Arc<dyn Clock>,
    config: SaveCleanerConfig,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SaveCleaner {
    pub fn new(bridge: Arc<dyn StorageBridge>, clock: Arc<dyn Clock>, config: SaveCleanerConfig) -> Self {
        Self {
            bridge,
            clock,
            config,
            metrics: None,
        }
    }

    /// Attaches a Prometheus metrics registry; deletions are recorded
    /// against it from then on.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Drives the retention pass forever at `config.interval_secs`.
    pub async fn run(&self) {
        let mut interval_timer = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            interval_timer.tick().await;
            run_once_with_metrics(self.bridge.as_ref(), self.clock.as_ref(), &self.config, self.metrics.as_deref()).await;
        }
    }
}
