//! Progress Loader (F)
//!
//! Composes `StorageBridge` with `mera-integrity`'s `enforce`/`merge` into
//! one orchestration function: enumerate backups, score them, pick or
//! merge a winner, and classify the result for the caller. A thin
//! orchestration function rather than a struct with behavior - the loader
//! holds no state across calls.

use std::collections::HashMap;
use std::sync::Arc;

use mera_core::config::Config;
use mera_core::domain::{BackupFilename, BackupKind, Bundle, CoreError, Sink};
use mera_core::ports::{Clock, CurriculumRegistry, StorageBridge};

use mera_integrity::{enforce, merge, EnforcementResult, RecoveryMetrics};

use crate::backups::list_backups;
use crate::escape_hatch::make_escape_hatch;
use crate::scenarios::{classify_no_selection, RecoveryScenario};
use crate::scoring::score;

const POD_KINDS: [BackupKind; 2] = [BackupKind::PodPrimary, BackupKind::PodDuplicate];
const LOCAL_KINDS: [BackupKind; 4] = [
    BackupKind::LocalOfflinePrimary,
    BackupKind::LocalOfflineDuplicate,
    BackupKind::LocalOnlinePrimary,
    BackupKind::LocalOnlineDuplicate,
];

/// The outcome of one `load` call.
#[derive(Debug, Clone)]
pub struct ProgressLoadResult {
    pub bundle: Option<Bundle>,
    pub scenario: RecoveryScenario,
    pub merge_occurred: bool,
    pub possibly_destructive: bool,
    pub recovery_metrics: Option<RecoveryMetrics>,
}

impl ProgressLoadResult {
    fn no_bundle(scenario: RecoveryScenario) -> Self {
        Self {
            bundle: None,
            scenario,
            merge_occurred: false,
            possibly_destructive: false,
            recovery_metrics: None,
        }
    }
}

/// One backup that survived scoring, carrying its sanitized enforcement
/// result and numeric score (lower is better; 0 means perfectly valid).
struct ScoredCandidate {
    filename: BackupFilename,
    enforcement: EnforcementResult,
    score: u32,
}

struct SinkScoreResult {
    best: Option<ScoredCandidate>,
    had_web_id_mismatch: bool,
    had_load_failure: bool,
}

/// Scores every backup in `backups` (already sorted newest-first),
/// returning the best one. Short-circuits on the first perfectly-valid
/// backup encountered, per §4.7.1.
async fn score_sink(
    bridge: &dyn StorageBridge,
    sink: Sink,
    backups: &[BackupFilename],
    registry: &dyn CurriculumRegistry,
    parsed_lessons: &HashMap<String, serde_json::Value>,
    web_id: &str,
    config: &mera_core::config::LoaderConfig,
) -> SinkScoreResult {
    let mut had_web_id_mismatch = false;
    let mut had_load_failure = false;
    let mut best: Option<ScoredCandidate> = None;

    for (index, filename) in backups.iter().enumerate() {
        let raw = match bridge.load(sink, &filename.to_string()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(filename = %filename, error = %err, "backup load failed, skipping");
                had_load_failure = true;
                continue;
            }
        };

        let enforcement = enforce(&raw, web_id, registry, parsed_lessons);
        if enforcement.critical_failures.web_id_mismatch.is_some() {
            had_web_id_mismatch = true;
            continue;
        }

        if enforcement.perfectly_valid_input {
            return SinkScoreResult {
                best: Some(ScoredCandidate { filename: filename.clone(), enforcement, score: 0 }),
                had_web_id_mismatch,
                had_load_failure,
            };
        }

        let candidate_score = score(&enforcement.recovery_metrics, index, config);
        let is_better = match &best {
            None => true,
            Some(current) => candidate_score < current.score,
        };
        if is_better {
            best = Some(ScoredCandidate { filename: filename.clone(), enforcement, score: candidate_score });
        }
    }

    SinkScoreResult { best, had_web_id_mismatch, had_load_failure }
}

/// The result of §4.7.2's selection step, before scenario classification.
struct Selection {
    bundle: Bundle,
    recovery_metrics: RecoveryMetrics,
    merge_occurred: bool,
    possibly_destructive: bool,
}

/// Re-runs Integrity over a merge's JSON serialization to enforce I8: a
/// merged bundle that still reports corruption is a non-recoverable
/// merger bug, not data to hand to the caller.
fn validate_merge(
    merged: &Bundle,
    web_id: &str,
    registry: &dyn CurriculumRegistry,
    parsed_lessons: &HashMap<String, serde_json::Value>,
) -> Result<RecoveryMetrics, CoreError> {
    let json = serde_json::to_string(merged)
        .map_err(|err| CoreError::MergerInvariantViolation(format!("merged bundle did not serialize: {err}")))?;
    let result = enforce(&json, web_id, registry, parsed_lessons);
    if result.recovery_metrics.corruption_detected() {
        return Err(CoreError::MergerInvariantViolation(
            "merge output still reports counter corruption after merging two sanitized bundles".to_string(),
        ));
    }
    Ok(result.recovery_metrics)
}

fn select(
    pod: Option<ScoredCandidate>,
    local: Option<ScoredCandidate>,
    web_id: &str,
    registry: &dyn CurriculumRegistry,
    parsed_lessons: &HashMap<String, serde_json::Value>,
    quality_threshold: u32,
) -> Result<Option<Selection>, CoreError> {
    match (pod, local) {
        (None, None) => Ok(None),
        (Some(pod), None) => Ok(Some(Selection {
            bundle: pod.enforcement.bundle,
            recovery_metrics: pod.enforcement.recovery_metrics,
            merge_occurred: false,
            possibly_destructive: !pod.enforcement.perfectly_valid_input,
        })),
        (None, Some(local)) => Ok(Some(Selection {
            bundle: local.enforcement.bundle,
            recovery_metrics: local.enforcement.recovery_metrics,
            merge_occurred: false,
            possibly_destructive: !local.enforcement.perfectly_valid_input,
        })),
        (Some(pod), Some(local)) => {
            if pod.score < quality_threshold {
                if local.filename.kind.is_offline_tag() {
                    let possibly_destructive =
                        !pod.enforcement.perfectly_valid_input || !local.enforcement.perfectly_valid_input;
                    let merged = merge(&pod.enforcement.bundle, &local.enforcement.bundle);
                    let recovery_metrics = validate_merge(&merged, web_id, registry, parsed_lessons)?;
                    Ok(Some(Selection {
                        bundle: merged,
                        recovery_metrics,
                        merge_occurred: true,
                        possibly_destructive,
                    }))
                } else {
                    Ok(Some(Selection {
                        bundle: pod.enforcement.bundle,
                        recovery_metrics: pod.enforcement.recovery_metrics,
                        merge_occurred: false,
                        possibly_destructive: !pod.enforcement.perfectly_valid_input,
                    }))
                }
            } else {
                let possibly_destructive =
                    !pod.enforcement.perfectly_valid_input || !local.enforcement.perfectly_valid_input;
                let merged = merge(&local.enforcement.bundle, &pod.enforcement.bundle);
                let recovery_metrics = validate_merge(&merged, web_id, registry, parsed_lessons)?;
                Ok(Some(Selection {
                    bundle: merged,
                    recovery_metrics,
                    merge_occurred: true,
                    possibly_destructive,
                }))
            }
        }
    }
}

fn classify_scenario(merge_occurred: bool, perfectly_valid_input: bool, metrics: &RecoveryMetrics) -> RecoveryScenario {
    if !merge_occurred && perfectly_valid_input {
        RecoveryScenario::PerfectRecovery
    } else if metrics.corruption_detected() {
        RecoveryScenario::ImperfectRecoveryCorruption
    } else {
        RecoveryScenario::ImperfectRecoveryMigration
    }
}

/// Loads, scores, selects, and (if warranted) repairs the progress bundle
/// for one learner.
///
/// `web_id` is the opaque identifier the embedding application's auth flow
/// already resolved; `None` means no authenticated session, short-circuiting
/// to `DefaultNoSaves` without touching storage at all.
///
/// Propagates only `CoreError::MergerInvariantViolation` - every other
/// failure mode (load errors, parse errors, web-id mismatches) is absorbed
/// into the returned `ProgressLoadResult`.
pub async fn load(
    bridge: Arc<dyn StorageBridge>,
    clock: Arc<dyn Clock>,
    registry: &dyn CurriculumRegistry,
    parsed_lessons: &HashMap<String, serde_json::Value>,
    web_id: Option<&str>,
    config: &Config,
) -> Result<ProgressLoadResult, CoreError> {
    let Some(web_id) = web_id else {
        return Ok(ProgressLoadResult::no_bundle(RecoveryScenario::DefaultNoSaves));
    };

    let pod_backups = list_backups(bridge.as_ref(), Sink::Pod, &POD_KINDS).await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to list pod backups");
        Vec::new()
    });
    let local_backups = list_backups(bridge.as_ref(), Sink::Local, &LOCAL_KINDS).await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to list local backups");
        Vec::new()
    });

    let escape_hatch_source = match pod_backups.iter().find(|f| f.kind == BackupKind::PodPrimary) {
        Some(newest_primary) => bridge.load(Sink::Pod, &newest_primary.to_string()).await.ok(),
        None => None,
    };

    let pod_score = score_sink(
        bridge.as_ref(),
        Sink::Pod,
        &pod_backups,
        registry,
        parsed_lessons,
        web_id,
        &config.loader,
    )
    .await;
    let local_score = score_sink(
        bridge.as_ref(),
        Sink::Local,
        &local_backups,
        registry,
        parsed_lessons,
        web_id,
        &config.loader,
    )
    .await;

    let total_backups = pod_backups.len() + local_backups.len();
    let had_web_id_mismatch = pod_score.had_web_id_mismatch || local_score.had_web_id_mismatch;
    let had_load_failures = pod_score.had_load_failure || local_score.had_load_failure;

    let selection = select(
        pod_score.best,
        local_score.best,
        web_id,
        registry,
        parsed_lessons,
        config.loader.quality_threshold,
    )?;

    let Some(selection) = selection else {
        return Ok(ProgressLoadResult::no_bundle(classify_no_selection(
            total_backups,
            had_web_id_mismatch,
            had_load_failures,
        )));
    };

    if (selection.possibly_destructive || selection.merge_occurred) && escape_hatch_source.is_some() {
        let raw_pod_json = escape_hatch_source.expect("checked Some above");
        let bridge = bridge.clone();
        let clock = clock.clone();
        let schema_version = (config.schema_version.major, config.schema_version.minor, config.schema_version.patch);
        let rate_limit_ms = config.escape_hatch.rate_limit_ms;
        let max_backups = config.escape_hatch.max_backups;
        tokio::spawn(async move {
            if let Err(err) =
                make_escape_hatch(bridge.as_ref(), clock.as_ref(), schema_version, rate_limit_ms, max_backups, &raw_pod_json).await
            {
                tracing::warn!(error = %err, "escape-hatch write failed");
            }
        });
    }

    let perfectly_valid = !selection.merge_occurred && !selection.possibly_destructive;
    let scenario = classify_scenario(selection.merge_occurred, perfectly_valid, &selection.recovery_metrics);

    Ok(ProgressLoadResult {
        bundle: Some(selection.bundle),
        scenario,
        merge_occurred: selection.merge_occurred,
        possibly_destructive: selection.possibly_destructive,
        recovery_metrics: Some(selection.recovery_metrics),
    })
}
