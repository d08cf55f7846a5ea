//! # Upload Orchestrator
//!
//! Drives the staged files of one course folder through the transfer:
//!
//! 1. Duplicate check, twice, with the processing wait in between
//! 2. Repair of residue left by an interrupted run (uploaded, never renamed)
//! 3. Sequential uploads, with cleanup of every unsuccessful one
//! 4. Processing wait, then a discovery check over the successful uploads
//! 5. Rename and source deletion of everything discovered
//! 6. Local deletion of every staged file that did not fail to upload
//!
//! Failures that concern a single file (a rejected request, a local I/O
//! problem) are recorded in the run context and the batch carries on. Any
//! other error is returned and aborts the run.

use bridge_traits::{
    media::{DestinationObject, DestinationPlatform, MediaUploader},
    storage::FileSystemAccess,
    time::Sleeper,
};
use core_runtime::config::MigrationConfig;
use core_runtime::events::{CoreEvent, CourseEvent, EventBus, RecordingEvent, RunEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{is_recoverable, MigrationError, Result};
use crate::finalize::RecordingFinalizer;
use crate::governor::TimeBudgetGovernor;
use crate::lifecycle::{LifecycleState, RecordingLifecycle};
use crate::matcher::{CheckMode, MatchOutcome, PresenceMatcher, PresentObject};
use crate::naming::StagedFile;
use crate::outcome::{RunContext, RunOutcome};

/// Waits and local cleanup behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub delete_local_recordings: bool,
    /// Destination processing lag
    pub processing_wait: Duration,
    /// Wait before cleaning up an unsuccessful upload
    pub failed_upload_wait: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            delete_local_recordings: config.policy.delete_local_recordings,
            processing_wait: config.timing.processing_wait(),
            failed_upload_wait: config.timing.failed_upload_wait(),
        }
    }
}

/// Per-file lifecycles for one batch, keyed by composed file name.
struct Tracker {
    lifecycles: Vec<RecordingLifecycle>,
    index: HashMap<String, usize>,
}

impl Tracker {
    fn new(files: &[StagedFile]) -> Self {
        let lifecycles: Vec<_> = files
            .iter()
            .map(|f| RecordingLifecycle::new(f.file_name()))
            .collect();
        let index = lifecycles
            .iter()
            .enumerate()
            .map(|(i, l)| (l.file_name().to_string(), i))
            .collect();
        Self { lifecycles, index }
    }

    fn advance(&mut self, file: &StagedFile, to: LifecycleState) -> Result<()> {
        match self.index.get(&file.file_name()) {
            Some(&i) => self.lifecycles[i].advance(to),
            None => Ok(()),
        }
    }

    fn advance_all(&mut self, to: LifecycleState) -> Result<()> {
        for lifecycle in &mut self.lifecycles {
            lifecycle.advance(to)?;
        }
        Ok(())
    }
}

pub struct UploadOrchestrator {
    destination: Arc<dyn DestinationPlatform>,
    uploader: Arc<dyn MediaUploader>,
    fs: Arc<dyn FileSystemAccess>,
    sleeper: Arc<dyn Sleeper>,
    finalizer: RecordingFinalizer,
    matcher: PresenceMatcher,
    governor: TimeBudgetGovernor,
    settings: OrchestratorSettings,
    event_bus: EventBus,
}

impl UploadOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        destination: Arc<dyn DestinationPlatform>,
        uploader: Arc<dyn MediaUploader>,
        fs: Arc<dyn FileSystemAccess>,
        sleeper: Arc<dyn Sleeper>,
        finalizer: RecordingFinalizer,
        matcher: PresenceMatcher,
        governor: TimeBudgetGovernor,
        settings: OrchestratorSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            destination,
            uploader,
            fs,
            sleeper,
            finalizer,
            matcher,
            governor,
            settings,
            event_bus,
        }
    }

    /// Transfer `files` into `folder_id`.
    ///
    /// Progress accumulates in `ctx.course` as it happens, so an aborted
    /// batch still leaves its undiscovered uploads and failed deletions for
    /// mitigation. Returns the lists for this batch.
    #[instrument(skip(self, files, ctx), fields(files = files.len()))]
    pub async fn process_course(
        &self,
        folder_id: &str,
        files: &[StagedFile],
        ctx: &mut RunContext,
    ) -> Result<RunOutcome> {
        let mut tracker = Tracker::new(files);
        let result = self.transfer(folder_id, files, ctx, &mut tracker).await;
        ctx.lifecycles.extend(tracker.lifecycles);
        result?;

        let batch = ctx.finish_course();
        if let Some(label) = files.first().map(|f| f.course_label.clone()) {
            self.event_bus
                .emit(CoreEvent::Course(CourseEvent::Completed {
                    label,
                    uploaded: batch.successful_uploads.len(),
                    already_present: batch.already_present.len(),
                }))
                .ok();
        }
        Ok(batch)
    }

    async fn transfer(
        &self,
        folder_id: &str,
        files: &[StagedFile],
        ctx: &mut RunContext,
        tracker: &mut Tracker,
    ) -> Result<()> {
        info!(folder_id, "Duplicate check");
        self.duplicate_check(folder_id, files, ctx).await?;
        self.sleeper.sleep(self.settings.processing_wait).await;
        let check = self.duplicate_check(folder_id, files, ctx).await?;
        tracker.advance_all(LifecycleState::DuplicateChecked)?;

        for hit in &check.present {
            ctx.course.already_present.push(hit.file.file_name());
        }
        if !check.present_unrenamed.is_empty() {
            self.repair_unrenamed(folder_id, &check.present_unrenamed, ctx, tracker)
                .await?;
        }

        let mut uploaded = Vec::new();
        for file in &check.absent {
            if self.governor.should_stop() {
                self.mark_controlled_stop(ctx);
                break;
            }
            tracker.advance(file, LifecycleState::Uploading)?;
            if self.upload_one(folder_id, file, ctx, tracker).await? {
                uploaded.push(file.clone());
            }
        }

        if !uploaded.is_empty() {
            debug!(wait_secs = self.settings.processing_wait.as_secs(), "Waiting before discovery");
            self.sleeper.sleep(self.settings.processing_wait).await;
            self.discover(folder_id, &uploaded, ctx, tracker).await?;
        }

        if self.settings.delete_local_recordings {
            self.delete_local(files, ctx, tracker).await?;
        }
        Ok(())
    }

    async fn duplicate_check(
        &self,
        folder_id: &str,
        files: &[StagedFile],
        ctx: &mut RunContext,
    ) -> Result<MatchOutcome> {
        let objects = self
            .destination
            .list_folder_objects(folder_id)
            .await
            .map_err(MigrationError::destination)?;
        Ok(self.matcher.check(
            &objects,
            files,
            folder_id,
            CheckMode::Duplicate,
            &mut ctx.undiscovered_folders,
        ))
    }

    /// Residue of an interrupted run: processed objects are finalised,
    /// unprocessed ones are deleted from the destination.
    async fn repair_unrenamed(
        &self,
        folder_id: &str,
        residue: &[PresentObject],
        ctx: &mut RunContext,
        tracker: &mut Tracker,
    ) -> Result<()> {
        for hit in residue {
            let object = match self.destination.get_object(&hit.object_id).await {
                Ok(object) => object,
                Err(e) if is_recoverable(&e) => {
                    warn!(file = %hit.file, error = %e, "Could not inspect unrenamed object");
                    continue;
                }
                Err(e) => return Err(MigrationError::Destination(e)),
            };

            if object.processed {
                info!(file = %hit.file, "Unrenamed object is processed, finalising");
                tracker.advance(&hit.file, LifecycleState::Discovered)?;
                self.finalize(folder_id, &hit.file, &object, ctx, tracker).await?;
            } else {
                warn!(file = %hit.file, "Unrenamed object never processed, deleting");
                match self.destination.delete_object(&object.id).await {
                    Ok(()) => {}
                    Err(e) if is_recoverable(&e) => {
                        warn!(file = %hit.file, error = %e, "Unprocessed object could not be deleted");
                        self.record_failed_deletion(&hit.file, ctx);
                        tracker.advance(&hit.file, LifecycleState::FailedDeletion)?;
                    }
                    Err(e) => return Err(MigrationError::Destination(e)),
                }
            }
        }
        Ok(())
    }

    /// Upload one file. Returns whether the upload completed.
    async fn upload_one(
        &self,
        folder_id: &str,
        file: &StagedFile,
        ctx: &mut RunContext,
        tracker: &mut Tracker,
    ) -> Result<bool> {
        info!(file = %file, folder_id, "Uploading");
        let reason = match self
            .uploader
            .upload(&file.path, file.created_at, folder_id)
            .await
        {
            Ok(status) if status.is_complete() => {
                tracker.advance(file, LifecycleState::Uploaded)?;
                ctx.course.successful_uploads.push(file.path.clone());
                self.event_bus
                    .emit(CoreEvent::Recording(RecordingEvent::Uploaded {
                        file_name: file.file_name(),
                    }))
                    .ok();
                return Ok(true);
            }
            Ok(status) => format!("{}: {}", status.code, status.name),
            Err(e) if is_recoverable(&e) => e.to_string(),
            Err(e) => return Err(MigrationError::Destination(e)),
        };

        error!(file = %file, reason = %reason, "Upload unsuccessful");
        tracker.advance(file, LifecycleState::UploadFailed)?;
        self.event_bus
            .emit(CoreEvent::Recording(RecordingEvent::UploadFailed {
                file_name: file.file_name(),
                reason,
            }))
            .ok();
        if !self.clean_up_failed_upload(file, ctx).await? {
            tracker.advance(file, LifecycleState::FailedDeletion)?;
        }
        Ok(false)
    }

    /// Remove the partial destination object and the local copy of an
    /// unsuccessful upload. Returns whether the destination side was cleaned.
    async fn clean_up_failed_upload(&self, file: &StagedFile, ctx: &mut RunContext) -> Result<bool> {
        self.sleeper.sleep(self.settings.failed_upload_wait).await;

        let file_name = file.file_name();
        let deleted = match self.destination.search_objects(&file_name).await {
            Ok(hits) => match hits.into_iter().next() {
                Some(hit) => match self.destination.delete_object(&hit.id).await {
                    Ok(()) => {
                        info!(file = %file, "Failed upload deleted from destination");
                        true
                    }
                    Err(e) if is_recoverable(&e) => {
                        warn!(file = %file, error = %e, "Failed upload could not be deleted");
                        false
                    }
                    Err(e) => return Err(MigrationError::Destination(e)),
                },
                None => {
                    warn!(file = %file, "Failed upload not found on destination");
                    false
                }
            },
            Err(e) if is_recoverable(&e) => {
                warn!(file = %file, error = %e, "Failed upload search rejected");
                false
            }
            Err(e) => return Err(MigrationError::Destination(e)),
        };
        if !deleted {
            self.record_failed_deletion(file, ctx);
        }

        match self.fs.delete_file(&file.path).await {
            Ok(()) => debug!(file = %file, "Failed upload deleted locally"),
            Err(e) => warn!(file = %file, error = %e, "Failed upload could not be deleted locally"),
        }
        ctx.course.failed_uploads.push(file.path.clone());
        Ok(deleted)
    }

    async fn discover(
        &self,
        folder_id: &str,
        uploaded: &[StagedFile],
        ctx: &mut RunContext,
        tracker: &mut Tracker,
    ) -> Result<()> {
        for file in uploaded {
            tracker.advance(file, LifecycleState::AwaitingDiscovery)?;
        }
        if uploaded.is_empty() {
            return Ok(());
        }

        info!(folder_id, uploaded = uploaded.len(), "Discovery check");
        let objects = match self.destination.list_folder_objects(folder_id).await {
            Ok(objects) => objects,
            Err(e) if is_recoverable(&e) => {
                warn!(folder_id, error = %e, "Discovery listing rejected, deferring to sweep");
                Vec::new()
            }
            Err(e) => return Err(MigrationError::Destination(e)),
        };

        let check = self.matcher.check(
            &objects,
            uploaded,
            folder_id,
            CheckMode::Discover,
            &mut ctx.undiscovered_folders,
        );

        for file in &check.absent {
            warn!(file = %file, "Upload not yet visible on destination");
            tracker.advance(file, LifecycleState::UndiscoveredUpload)?;
            ctx.course.undiscovered_uploads.push(file.clone());
            self.event_bus
                .emit(CoreEvent::Recording(RecordingEvent::Undiscovered {
                    file_name: file.file_name(),
                }))
                .ok();
        }

        let by_id: HashMap<&str, &DestinationObject> =
            objects.iter().map(|o| (o.id.as_str(), o)).collect();
        for hit in &check.present {
            tracker.advance(&hit.file, LifecycleState::Discovered)?;
            self.event_bus
                .emit(CoreEvent::Recording(RecordingEvent::Discovered {
                    file_name: hit.file.file_name(),
                    session_id: hit.object_id.clone(),
                }))
                .ok();
            if let Some(object) = by_id.get(hit.object_id.as_str()) {
                self.finalize(folder_id, &hit.file, object, ctx, tracker).await?;
            }
        }
        Ok(())
    }

    async fn finalize(
        &self,
        folder_id: &str,
        file: &StagedFile,
        object: &DestinationObject,
        ctx: &mut RunContext,
        tracker: &mut Tracker,
    ) -> Result<()> {
        let done = self
            .finalizer
            .finalize(file, &object.id, folder_id, &mut ctx.course)
            .await?;
        if done.renamed {
            tracker.advance(file, LifecycleState::Renamed)?;
        }
        if done.source_deleted {
            tracker.advance(file, LifecycleState::SourceDeleted)?;
        } else if done.source_refused {
            tracker.advance(file, LifecycleState::FailedDeletion)?;
        }
        Ok(())
    }

    /// Delete every staged file that did not fail to upload.
    async fn delete_local(
        &self,
        files: &[StagedFile],
        ctx: &mut RunContext,
        tracker: &mut Tracker,
    ) -> Result<()> {
        for file in files {
            if ctx.course.is_failed_upload(file) {
                continue;
            }
            match self.fs.delete_file(&file.path).await {
                Ok(()) => tracker.advance(file, LifecycleState::LocallyDeleted)?,
                Err(e) => warn!(file = %file, error = %e, "Local copy could not be deleted"),
            }
        }
        debug!(count = files.len(), "Local copies removed");
        Ok(())
    }

    fn record_failed_deletion(&self, file: &StagedFile, ctx: &mut RunContext) {
        ctx.course.failed_deletions.push(file.clone());
        self.event_bus
            .emit(CoreEvent::Recording(RecordingEvent::DeletionFailed {
                file_name: file.file_name(),
            }))
            .ok();
    }

    fn mark_controlled_stop(&self, ctx: &mut RunContext) {
        if !ctx.controlled_stop {
            ctx.controlled_stop = true;
            self.event_bus
                .emit(CoreEvent::Run(RunEvent::ControlledStop {
                    run_id: ctx.run_id.clone(),
                    at: self.governor.now_label(),
                }))
                .ok();
        }
    }
}
