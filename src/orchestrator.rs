//! The 6-stage historical backfill orchestrator. Stages are ordered so
//! every stage's ingestors have their FK dependencies already in the
//! store; within a stage, independent ingestors fan out across a bounded
//! worker pool, pulled from a shared queue onto a `JoinSet`, and the
//! per-source rate limiters are the only serialization point.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::{Config, RetryConfig};
use crate::ingestor::{IngestResult, IngestStatus, Kwargs, SourceContexts};
use crate::quarantine::Quarantine;
use crate::registry;
use crate::store::Store;

/// The explicit work list for one backfill run. The core does not itself
/// enumerate "every game that ever happened" -- that directory lookup is
/// an external concern, the same kind of external input as the schema
/// migration and reprojection tooling, typically seeded from a prior
/// successful run's audit table or a source-provided index.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BackfillPlan {
    pub seasons: Vec<String>,
    pub franchise_ids: Vec<String>,
    pub player_ids: Vec<String>,
    pub game_ids: Vec<String>,
}

/// Tally of terminal outcomes across a run, with the non-zero-exit rule a
/// caller (the CLI, a cron wrapper) needs: any failure makes the whole run
/// non-clean even if most entities succeeded.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Summary {
    pub success: usize,
    pub empty: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_results(results: &[IngestResult]) -> Self {
        let mut summary = Summary::default();
        for result in results {
            match result.status {
                IngestStatus::Success => summary.success += 1,
                IngestStatus::Empty => summary.empty += 1,
                IngestStatus::Failed => summary.failed += 1,
                IngestStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.success + self.empty + self.failed + self.skipped
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// One (entity_kind, entity_id, kwargs) unit of work handed to a worker.
struct WorkItem {
    entity_kind: &'static str,
    entity_id: String,
    kwargs: Kwargs,
}

pub struct Orchestrator {
    store: Store,
    contexts: SourceContexts,
    quarantine: Quarantine,
    retry: RetryConfig,
    worker_pool_size: usize,
}

impl Orchestrator {
    pub fn new(store: Store, contexts: SourceContexts, config: &Config) -> Self {
        Self {
            store,
            contexts,
            quarantine: Quarantine::new(config.vault_root.join("data").join("quarantine")),
            retry: config.retry.clone(),
            worker_pool_size: config.worker_pool_size,
        }
    }

    /// Runs all six stages in order, stopping (without starting the next
    /// stage) if `cancel` is signalled between stages. A stage already in
    /// flight finishes its in-flight work items cooperatively -- individual
    /// ingestors observe `cancel` between network calls and batch commits.
    #[instrument(skip(self, plan, cancel))]
    pub async fn run_backfill(&self, plan: &BackfillPlan, cancel: &CancellationToken) -> Vec<IngestResult> {
        let mut results = Vec::new();

        for (stage_num, items) in self.stages(plan).into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(stage = stage_num, "cancellation observed, stopping before stage");
                break;
            }
            info!(stage = stage_num, items = items.len(), "starting backfill stage");
            let stage_results = self.run_stage(items, cancel).await;
            let failed = stage_results.iter().filter(|r| r.status == IngestStatus::Failed).count();
            if failed > 0 {
                warn!(stage = stage_num, failed, "stage completed with failures");
            } else {
                info!(stage = stage_num, "stage completed cleanly");
            }
            results.extend(stage_results);
        }

        results
    }

    /// Builds the six stage work lists in FK-dependency order. Stage 0's
    /// bulk archives each run a single "all" call.
    fn stages(&self, plan: &BackfillPlan) -> Vec<Vec<WorkItem>> {
        let season_kwargs = |season: &str| Kwargs {
            season: Some(season.to_string()),
            ..Default::default()
        };

        let stage0 = vec!["bulk_elo", "bulk_raptor", "bulk_pbp", "bulk_box_scores"]
            .into_iter()
            .map(|kind| WorkItem {
                entity_kind: kind,
                entity_id: "all".to_string(),
                kwargs: Kwargs::default(),
            })
            .collect();

        let mut stage1 = Vec::new();
        for season in &plan.seasons {
            stage1.push(WorkItem {
                entity_kind: "seasons",
                entity_id: season.clone(),
                kwargs: Kwargs::default(),
            });
            stage1.push(WorkItem {
                entity_kind: "draft",
                entity_id: season.clone(),
                kwargs: Kwargs::default(),
            });
        }
        for franchise_id in &plan.franchise_ids {
            stage1.push(WorkItem {
                entity_kind: "franchises",
                entity_id: franchise_id.clone(),
                kwargs: Kwargs::default(),
            });
        }
        for player_id in &plan.player_ids {
            stage1.push(WorkItem {
                entity_kind: "players",
                entity_id: player_id.clone(),
                kwargs: Kwargs::default(),
            });
        }

        let mut stage2 = Vec::new();
        for season in &plan.seasons {
            for kind in ["teams", "lineups", "team_advanced", "coaches"] {
                stage2.push(WorkItem {
                    entity_kind: kind,
                    entity_id: season.clone(),
                    kwargs: season_kwargs(season),
                });
            }
        }

        let mut stage3 = Vec::new();
        for game_id in &plan.game_ids {
            for kind in [
                "officials",
                "box_score_traditional",
                "box_score_advanced",
                "box_score_hustle",
                "team_other_stats",
                "play_by_play",
                "shot_charts",
            ] {
                stage3.push(WorkItem {
                    entity_kind: kind,
                    entity_id: game_id.clone(),
                    kwargs: Kwargs::default(),
                });
            }
        }

        let mut stage4 = Vec::new();
        for player_id in &plan.player_ids {
            for season in &plan.seasons {
                for kind in ["awards", "tracking"] {
                    stage4.push(WorkItem {
                        entity_kind: kind,
                        entity_id: player_id.clone(),
                        kwargs: season_kwargs(season),
                    });
                }
            }
        }

        let stage5 = vec![WorkItem {
            entity_kind: "injuries",
            entity_id: "all".to_string(),
            kwargs: Kwargs::default(),
        }];

        vec![stage0, stage1, stage2, stage3, stage4, stage5]
    }

    /// Runs one stage's work items across a bounded worker pool. The
    /// semaphore caps in-flight tasks; the per-source rate limiters (shared
    /// via `SourceContexts`) are the actual serialization point beneath it.
    /// Tasks are pulled from a shared queue onto a `JoinSet` rather than a
    /// fixed `Vec` of workers, since a stage's item count is unbounded and
    /// unknown ahead of a backfill run.
    async fn run_stage(&self, items: Vec<WorkItem>, cancel: &CancellationToken) -> Vec<IngestResult> {
        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size.max(1)));
        let mut tasks = JoinSet::new();

        for item in items {
            let Some(ingestor) = registry::create(item.entity_kind, &self.contexts) else {
                error!(entity_kind = item.entity_kind, "no ingestor registered for entity kind");
                continue;
            };
            let pool = self.store.pool.clone();
            let quarantine = self.quarantine.clone();
            let retry = self.retry.clone();
            let cancel = cancel.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let result = ingestor
                    .ingest_dyn(&item.entity_id, &pool, &quarantine, &retry, item.kwargs, &cancel)
                    .await;
                match result.status {
                    IngestStatus::Failed => {
                        warn!(
                            entity_kind = ingestor.entity_kind(),
                            entity_id = %result.entity_id,
                            error = ?result.error_message,
                            "ingest failed"
                        );
                    }
                    _ => {
                        info!(
                            entity_kind = ingestor.entity_kind(),
                            entity_id = %result.entity_id,
                            status = ?result.status,
                            "ingest finished"
                        );
                    }
                }
                result
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(join_err) => {
                    error!(%join_err, "ingest task panicked");
                }
            }
        }
        results
    }
}
