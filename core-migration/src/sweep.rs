//! # Reconciliation Sweep
//!
//! Bounded repair of what the orchestrator could not finish:
//!
//! - **Re-discover**: look again for uploads that were not visible yet,
//!   finalising every one that has appeared.
//! - **Re-delete**: retry destination deletions that failed.
//!
//! Each pass waits the sweep interval first. A run gets a fixed number of
//! passes of each; whatever is still pending afterwards is reported and left
//! for the next run's duplicate check. Nothing in here fails the run.

use bridge_traits::{media::DestinationPlatform, time::Sleeper};
use core_runtime::config::MigrationConfig;
use core_runtime::events::{CoreEvent, EventBus, SweepEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::finalize::RecordingFinalizer;
use crate::matcher::{CheckMode, PresenceMatcher, UndiscoveredFolders};
use crate::naming::StagedFile;
use crate::outcome::RunOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSettings {
    /// Passes of each loop per run
    pub rounds: u32,
    /// Wait before every pass
    pub sweep_wait: Duration,
}

impl SweepSettings {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            rounds: config.sweep_rounds,
            sweep_wait: config.timing.sweep_wait(),
        }
    }
}

/// What was still pending after the sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepResult {
    pub undiscovered: Vec<StagedFile>,
    pub failed_deletions: Vec<StagedFile>,
    /// Source deletions refused during re-discovery
    pub failed_source_deletions: Vec<String>,
}

pub struct SweepEngine {
    destination: Arc<dyn DestinationPlatform>,
    sleeper: Arc<dyn Sleeper>,
    finalizer: RecordingFinalizer,
    matcher: PresenceMatcher,
    settings: SweepSettings,
    event_bus: EventBus,
}

impl SweepEngine {
    pub fn new(
        destination: Arc<dyn DestinationPlatform>,
        sleeper: Arc<dyn Sleeper>,
        finalizer: RecordingFinalizer,
        matcher: PresenceMatcher,
        settings: SweepSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            destination,
            sleeper,
            finalizer,
            matcher,
            settings,
            event_bus,
        }
    }

    /// One re-discover pass. Returns the files still undiscovered.
    ///
    /// Every folder in `folders` is listed once; a pending file is resolved
    /// when its folder holds an object under either of its names and
    /// finalising it succeeds. Source refusals land in `outcome`.
    #[instrument(skip_all, fields(pending = pending.len()))]
    pub async fn re_discover(
        &self,
        pending: &[StagedFile],
        folders: &UndiscoveredFolders,
        outcome: &mut RunOutcome,
    ) -> Vec<StagedFile> {
        self.sleeper.sleep(self.settings.sweep_wait).await;
        info!("Re-discover");

        let mut remaining: Vec<StagedFile> = pending.to_vec();
        for (label, folder_id) in folders {
            let candidates: Vec<StagedFile> = remaining
                .iter()
                .filter(|f| &f.course_label == label)
                .cloned()
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let objects = match self.destination.list_folder_objects(folder_id).await {
                Ok(objects) => objects,
                Err(e) => {
                    warn!(label = %label, folder_id = %folder_id, error = %e, "Re-discover listing failed");
                    continue;
                }
            };

            let mut scratch = UndiscoveredFolders::new();
            let check = self.matcher.check(
                &objects,
                &candidates,
                folder_id,
                CheckMode::Discover,
                &mut scratch,
            );
            for hit in check.present {
                match self
                    .finalizer
                    .finalize(&hit.file, &hit.object_id, folder_id, outcome)
                    .await
                {
                    Ok(done) if done.renamed => {
                        info!(file = %hit.file, "Re-discovered");
                        remaining.retain(|f| f.path != hit.file.path);
                    }
                    Ok(_) => debug!(file = %hit.file, "Re-discovered but not renamed"),
                    Err(e) => warn!(file = %hit.file, error = %e, "Re-discover failed"),
                }
            }
        }
        remaining
    }

    /// One re-delete pass. Returns the files whose destination object is
    /// still not deleted.
    #[instrument(skip_all, fields(pending = pending.len()))]
    pub async fn re_delete(&self, pending: &[StagedFile]) -> Vec<StagedFile> {
        self.sleeper.sleep(self.settings.sweep_wait).await;
        info!("Re-delete");

        let mut remaining = Vec::new();
        for file in pending {
            let file_name = file.file_name();
            let hit = match self.destination.search_objects(&file_name).await {
                Ok(hits) => hits.into_iter().next(),
                Err(e) => {
                    warn!(file = %file, error = %e, "Re-delete search failed");
                    remaining.push(file.clone());
                    continue;
                }
            };
            let Some(hit) = hit else {
                warn!(file = %file, "Re-delete found nothing to delete");
                remaining.push(file.clone());
                continue;
            };
            match self.destination.delete_object(&hit.id).await {
                Ok(()) => info!(file = %file, "Failed upload deleted"),
                Err(e) => {
                    warn!(file = %file, error = %e, "Re-delete failed");
                    remaining.push(file.clone());
                }
            }
        }
        remaining
    }

    /// End-of-run sweep: up to `rounds` re-discover passes, then up to
    /// `rounds` re-delete passes. A loop stops early once its list is empty.
    pub async fn reconcile(
        &self,
        undiscovered: Vec<StagedFile>,
        failed_deletions: Vec<StagedFile>,
        folders: &UndiscoveredFolders,
    ) -> SweepResult {
        let mut outcome = RunOutcome::default();
        let mut undiscovered = undiscovered;
        for round in 1..=self.settings.rounds {
            if undiscovered.is_empty() {
                break;
            }
            let before = undiscovered.len();
            undiscovered = self.re_discover(&undiscovered, folders, &mut outcome).await;
            self.emit_round(true, round, before, undiscovered.len());
        }

        let mut failed_deletions = failed_deletions;
        for round in 1..=self.settings.rounds {
            if failed_deletions.is_empty() {
                break;
            }
            let before = failed_deletions.len();
            failed_deletions = self.re_delete(&failed_deletions).await;
            self.emit_round(false, round, before, failed_deletions.len());
        }

        SweepResult {
            undiscovered,
            failed_deletions,
            failed_source_deletions: outcome.failed_source_deletions,
        }
    }

    /// Crash path: one pass of each loop, then one more of each for whatever
    /// is left. Never fails; leftovers are picked up by the next run.
    pub async fn mitigate(
        &self,
        undiscovered: Vec<StagedFile>,
        failed_deletions: Vec<StagedFile>,
        folders: &UndiscoveredFolders,
    ) -> SweepResult {
        info!(
            undiscovered = undiscovered.len(),
            failed_deletions = failed_deletions.len(),
            "Mitigating before restart"
        );
        self.event_bus
            .emit(CoreEvent::Sweep(SweepEvent::MitigationStarted {
                undiscovered: undiscovered.len(),
                failed_deletions: failed_deletions.len(),
            }))
            .ok();

        let mut outcome = RunOutcome::default();
        let mut undiscovered = undiscovered;
        let mut failed_deletions = failed_deletions;
        for round in 1..=2 {
            if !undiscovered.is_empty() {
                let before = undiscovered.len();
                undiscovered = self.re_discover(&undiscovered, folders, &mut outcome).await;
                self.emit_round(true, round, before, undiscovered.len());
            }
            if !failed_deletions.is_empty() {
                let before = failed_deletions.len();
                failed_deletions = self.re_delete(&failed_deletions).await;
                self.emit_round(false, round, before, failed_deletions.len());
            }
        }

        SweepResult {
            undiscovered,
            failed_deletions,
            failed_source_deletions: outcome.failed_source_deletions,
        }
    }

    fn emit_round(&self, discover: bool, round: u32, before: usize, after: usize) {
        let resolved = before.saturating_sub(after);
        let event = if discover {
            SweepEvent::RediscoverRound {
                round,
                pending: after,
                resolved,
            }
        } else {
            SweepEvent::RedeleteRound {
                round,
                pending: after,
                resolved,
            }
        };
        self.event_bus.emit(CoreEvent::Sweep(event)).ok();
    }
}
