//! # Migration Runner
//!
//! One full run: pre-run reset, then for every eligible course stage its
//! recordings, resolve its destination folder and hand each folder batch to
//! the [`UploadOrchestrator`]. A run that finishes (or stops at the cutoff)
//! gets the bounded sweep; a run that aborts gets one mitigation pass over
//! whatever had accumulated.

use bridge_traits::{
    media::{DestinationPlatform, MediaUploader, SourcePlatform},
    storage::FileSystemAccess,
    time::{Clock, Sleeper},
};
use core_runtime::config::MigrationConfig;
use core_runtime::events::{CoreEvent, CourseEvent, EventBus, RunEvent};
use std::slice;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::finalize::RecordingFinalizer;
use crate::governor::TimeBudgetGovernor;
use crate::matcher::PresenceMatcher;
use crate::naming::StagedFile;
use crate::orchestrator::{OrchestratorSettings, UploadOrchestrator};
use crate::outcome::RunContext;
use crate::report::RunReport;
use crate::resolver::{FolderMappingStore, FolderResolver, ResolutionStep};
use crate::source::{
    attach_created_at, group_by_container, Course, CourseSource, DateRange, DownloadsDirectory,
    RecordingStager,
};
use crate::sweep::{SweepEngine, SweepSettings};

/// Everything a run talks to.
#[derive(Clone)]
pub struct Platforms {
    pub destination: Arc<dyn DestinationPlatform>,
    pub uploader: Arc<dyn MediaUploader>,
    pub source: Arc<dyn SourcePlatform>,
    pub courses: Arc<dyn CourseSource>,
    pub stager: Arc<dyn RecordingStager>,
    pub mapping_store: Arc<dyn FolderMappingStore>,
    pub fs: Arc<dyn FileSystemAccess>,
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
}

pub struct MigrationRunner {
    destination: Arc<dyn DestinationPlatform>,
    courses: Arc<dyn CourseSource>,
    stager: Arc<dyn RecordingStager>,
    mapping_store: Arc<dyn FolderMappingStore>,
    clock: Arc<dyn Clock>,
    downloads: DownloadsDirectory,
    orchestrator: UploadOrchestrator,
    sweep: SweepEngine,
    governor: TimeBudgetGovernor,
    default_folder_id: String,
    event_bus: EventBus,
}

impl MigrationRunner {
    pub fn new(config: &MigrationConfig, platforms: Platforms, event_bus: EventBus) -> Self {
        let default_folder_id = config.destination.default_folder_id.clone();
        let matcher = PresenceMatcher::new(default_folder_id.clone());
        let governor = TimeBudgetGovernor::new(platforms.clock.clone(), &config.schedule);
        let finalizer = RecordingFinalizer::new(
            platforms.destination.clone(),
            platforms.source.clone(),
            config.policy,
            default_folder_id.clone(),
            event_bus.clone(),
        );

        let orchestrator = UploadOrchestrator::new(
            platforms.destination.clone(),
            platforms.uploader.clone(),
            platforms.fs.clone(),
            platforms.sleeper.clone(),
            finalizer.clone(),
            matcher.clone(),
            governor.clone(),
            OrchestratorSettings::from_config(config),
            event_bus.clone(),
        );
        let sweep = SweepEngine::new(
            platforms.destination.clone(),
            platforms.sleeper.clone(),
            finalizer,
            matcher,
            SweepSettings::from_config(config),
            event_bus.clone(),
        );

        Self {
            destination: platforms.destination,
            courses: platforms.courses,
            stager: platforms.stager,
            mapping_store: platforms.mapping_store,
            clock: platforms.clock,
            downloads: DownloadsDirectory::new(platforms.fs, config.downloads_dir.clone()),
            orchestrator,
            sweep,
            governor,
            default_folder_id,
            event_bus,
        }
    }

    pub fn sweep(&self) -> &SweepEngine {
        &self.sweep
    }

    /// Forget folder mappings and leftover downloads so the run re-derives
    /// everything. Failures are logged only.
    pub async fn pre_run_reset(&self) {
        if let Err(e) = self.mapping_store.clear().await {
            warn!(error = %e, "Could not clear folder mapping");
        }
        match self.downloads.clear().await {
            Ok(removed) => info!(removed, "Downloads directory cleared"),
            Err(e) => warn!(error = %e, "Could not clear downloads directory"),
        }
    }

    /// Run once over `range`.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the run, after mitigation has run.
    #[instrument(skip(self))]
    pub async fn run(&self, range: &DateRange) -> Result<RunReport> {
        let started_at = self.clock.now();
        let mut ctx = RunContext::new();
        info!(run_id = %ctx.run_id, "Run started");
        self.event_bus
            .emit(CoreEvent::Run(RunEvent::Started {
                run_id: ctx.run_id.clone(),
            }))
            .ok();

        self.pre_run_reset().await;

        if let Err(e) = self.execute(range, &mut ctx).await {
            error!(run_id = %ctx.run_id, error = %e, "Run aborted");
            self.event_bus
                .emit(CoreEvent::Run(RunEvent::Failed {
                    run_id: ctx.run_id.clone(),
                    message: e.to_string(),
                }))
                .ok();
            let pending = ctx.snapshot();
            let left = self
                .sweep
                .mitigate(
                    pending.undiscovered_uploads,
                    pending.failed_deletions,
                    &ctx.undiscovered_folders,
                )
                .await;
            warn!(
                undiscovered = left.undiscovered.len(),
                failed_deletions = left.failed_deletions.len(),
                "Mitigation finished"
            );
            return Err(e);
        }

        let swept = self
            .sweep
            .reconcile(
                ctx.outcome.undiscovered_uploads.clone(),
                ctx.outcome.failed_deletions.clone(),
                &ctx.undiscovered_folders,
            )
            .await;
        ctx.outcome
            .failed_source_deletions
            .extend(swept.failed_source_deletions);

        let report = RunReport {
            run_id: ctx.run_id.clone(),
            started_at,
            finished_at: self.clock.now(),
            controlled_stop: ctx.controlled_stop,
            outcome: ctx.outcome,
            final_undiscovered: swept.undiscovered,
            final_failed_deletions: swept.failed_deletions,
            missing_folders: ctx.missing_folders,
        };
        info!(
            run_id = %report.run_id,
            uploaded = report.outcome.successful_uploads.len(),
            undiscovered = report.final_undiscovered.len(),
            failed_deletions = report.final_failed_deletions.len(),
            controlled_stop = report.controlled_stop,
            "Run finished"
        );
        self.event_bus
            .emit(CoreEvent::Run(RunEvent::Completed {
                run_id: report.run_id.clone(),
                uploaded: report.outcome.successful_uploads.len(),
                undiscovered: report.final_undiscovered.len(),
                failed_deletions: report.final_failed_deletions.len(),
            }))
            .ok();
        Ok(report)
    }

    /// The course loop, without reset or sweep.
    pub async fn execute(&self, range: &DateRange, ctx: &mut RunContext) -> Result<()> {
        let courses = self.courses.list_eligible_courses(range).await?;
        info!(courses = courses.len(), "Eligible courses listed");

        let mut resolver = FolderResolver::new(
            self.destination.clone(),
            self.mapping_store.clone(),
            self.default_folder_id.clone(),
        );

        for course in &courses {
            if self.governor.should_stop() {
                self.mark_controlled_stop(ctx);
                break;
            }
            self.process(course, range, &mut resolver, ctx).await?;
            if ctx.controlled_stop {
                break;
            }
        }
        Ok(())
    }

    async fn process(
        &self,
        course: &Course,
        range: &DateRange,
        resolver: &mut FolderResolver,
        ctx: &mut RunContext,
    ) -> Result<()> {
        info!(course = %course.label, "Staging course recordings");
        let staging = self.stager.stage_course(course, range).await?;
        ctx.outcome.failed_downloads.extend(staging.failed_downloads);
        self.event_bus
            .emit(CoreEvent::Course(CourseEvent::Started {
                label: course.label.clone(),
                staged: staging.staged.len(),
            }))
            .ok();
        if staging.staged.is_empty() {
            return Ok(());
        }

        let resolved = match resolver.resolve_courses(slice::from_ref(course)).await {
            Ok(resolved) => resolved,
            Err(e) if e.is_recoverable() => {
                warn!(course = %course.label, error = %e, "Folder resolution rejected, keeping recordings local");
                return self.keep_course_local(course, &staging.staged, ctx).await;
            }
            Err(e) => return Err(e),
        };
        ctx.missing_folders.extend(resolved.missing_folders.iter().cloned());
        for resolution in &resolved.resolutions {
            self.event_bus
                .emit(CoreEvent::Course(CourseEvent::FolderResolved {
                    label: resolution.label.clone(),
                    folder_id: resolution.folder_id.clone(),
                    fallback: resolution.step == ResolutionStep::DefaultFolder,
                }))
                .ok();
        }

        let scanned = match self.downloads.scan().await {
            Ok(scanned) => scanned,
            Err(e) if e.is_recoverable() => {
                warn!(course = %course.label, error = %e, "Downloads scan failed, keeping recordings local");
                ctx.outcome
                    .failed_uploads
                    .extend(staging.staged.iter().map(|f| f.path.clone()));
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let files = attach_created_at(scanned, &staging.staged);
        for (folder_id, batch) in group_by_container(files, &resolved.mapping()) {
            match self.orchestrator.process_course(&folder_id, &batch, ctx).await {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(course = %course.label, folder_id = %folder_id, error = %e, "Folder batch rejected, keeping recordings local");
                    let already: Vec<_> = ctx.course.successful_uploads.clone();
                    ctx.course.failed_uploads.extend(
                        batch
                            .iter()
                            .filter(|f| !already.contains(&f.path))
                            .map(|f| f.path.clone()),
                    );
                    ctx.finish_course();
                }
                Err(e) => return Err(e),
            }
            if ctx.controlled_stop {
                break;
            }
        }
        Ok(())
    }

    /// Record every staged file of `course` as not uploaded. Falls back to
    /// the stager's own list when the downloads directory cannot be read.
    async fn keep_course_local(
        &self,
        course: &Course,
        staged: &[StagedFile],
        ctx: &mut RunContext,
    ) -> Result<()> {
        let label = course.file_label();
        let kept: Vec<_> = match self.downloads.scan().await {
            Ok(scanned) => scanned
                .into_iter()
                .filter(|f| f.course_label == label)
                .map(|f| f.path)
                .collect(),
            Err(e) if e.is_recoverable() => {
                warn!(course = %course.label, error = %e, "Downloads scan failed");
                staged.iter().map(|f| f.path.clone()).collect()
            }
            Err(e) => return Err(e),
        };
        ctx.outcome.failed_uploads.extend(kept);
        Ok(())
    }

    fn mark_controlled_stop(&self, ctx: &mut RunContext) {
        ctx.controlled_stop = true;
        self.event_bus
            .emit(CoreEvent::Run(RunEvent::ControlledStop {
                run_id: ctx.run_id.clone(),
                at: self.governor.now_label(),
            }))
            .ok();
    }
}
