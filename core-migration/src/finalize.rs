//! Rename a discovered object and apply the source-deletion policy.
//!
//! Shared by the orchestrator (fresh and residue uploads) and the sweep
//! (late discoveries) so both follow the same rules.

use bridge_traits::media::{DestinationPlatform, SourcePlatform};
use core_runtime::config::DeletionPolicy;
use core_runtime::events::{CoreEvent, EventBus, RecordingEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{is_recoverable, MigrationError, Result};
use crate::naming::StagedFile;
use crate::outcome::RunOutcome;

/// What finalising one object achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Finalized {
    pub renamed: bool,
    pub source_deleted: bool,
    /// Policy allowed deletion but the source refused it
    pub source_refused: bool,
}

#[derive(Clone)]
pub struct RecordingFinalizer {
    destination: Arc<dyn DestinationPlatform>,
    source: Arc<dyn SourcePlatform>,
    policy: DeletionPolicy,
    default_folder_id: String,
    event_bus: EventBus,
}

impl RecordingFinalizer {
    pub fn new(
        destination: Arc<dyn DestinationPlatform>,
        source: Arc<dyn SourcePlatform>,
        policy: DeletionPolicy,
        default_folder_id: impl Into<String>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            destination,
            source,
            policy,
            default_folder_id: default_folder_id.into(),
            event_bus,
        }
    }

    pub fn policy(&self) -> &DeletionPolicy {
        &self.policy
    }

    /// Rename `object_id` to the canonical name of `file`, then delete the
    /// source recording when the policy allows it for `folder_id`.
    ///
    /// A rejected rename skips source deletion; the object keeps its long
    /// name and the next run's duplicate check repairs it. A refused source
    /// deletion is recorded in `outcome.failed_source_deletions`.
    ///
    /// # Errors
    ///
    /// Only unrecoverable remote failures are returned.
    pub async fn finalize(
        &self,
        file: &StagedFile,
        object_id: &str,
        folder_id: &str,
        outcome: &mut RunOutcome,
    ) -> Result<Finalized> {
        let mut result = Finalized::default();
        let name = file.canonical_name(folder_id == self.default_folder_id);

        match self.destination.rename_object(object_id, &name).await {
            Ok(()) => {
                debug!(session_id = object_id, name = %name, "Renamed");
                result.renamed = true;
                self.event_bus
                    .emit(CoreEvent::Recording(RecordingEvent::Renamed {
                        session_id: object_id.to_string(),
                        name,
                    }))
                    .ok();
            }
            Err(e) if is_recoverable(&e) => {
                warn!(file = %file, session_id = object_id, error = %e, "Rename rejected");
                return Ok(result);
            }
            Err(e) => return Err(MigrationError::Destination(e)),
        }

        if !self
            .policy
            .allows_source_delete(folder_id, &self.default_folder_id)
        {
            debug!(file = %file, "Source deletion not permitted by policy");
            return Ok(result);
        }

        match self.source.delete_recording(&file.recording_id).await {
            Ok(true) => {
                info!(recording_id = %file.recording_id, "Source recording deleted");
                result.source_deleted = true;
                self.event_bus
                    .emit(CoreEvent::Recording(RecordingEvent::SourceDeleted {
                        recording_id: file.recording_id.clone(),
                    }))
                    .ok();
            }
            Ok(false) => {
                warn!(recording_id = %file.recording_id, "Source refused deletion");
                result.source_refused = true;
                outcome.failed_source_deletions.push(file.recording_id.clone());
            }
            Err(e) if is_recoverable(&e) => {
                warn!(recording_id = %file.recording_id, error = %e, "Source deletion rejected");
                result.source_refused = true;
                outcome.failed_source_deletions.push(file.recording_id.clone());
            }
            Err(e) => return Err(MigrationError::Source(e)),
        }
        Ok(result)
    }
}
