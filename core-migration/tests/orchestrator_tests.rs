//! Integration tests for the upload orchestrator against in-memory platforms.

mod common;

use common::*;
use core_migration::{
    LifecycleState, OrchestratorSettings, PresenceMatcher, RecordingFinalizer, RunContext,
    StagedFile, TimeBudgetGovernor, UploadOrchestrator,
};
use core_runtime::config::DeletionPolicy;
use core_runtime::events::{CoreEvent, EventBus, RecordingEvent};
use std::sync::Arc;
use std::time::Duration;

const FOLDER: &str = "f-cs101";

struct Harness {
    destination: FakeDestination,
    uploader: Arc<FakeUploader>,
    source: Arc<FakeSource>,
    fs: Arc<MemoryFs>,
    sleeper: Arc<RecordingSleeper>,
    bus: EventBus,
}

impl Harness {
    fn new() -> Self {
        let destination = FakeDestination::new();
        Self {
            uploader: Arc::new(FakeUploader::new(destination.clone())),
            destination,
            source: Arc::new(FakeSource::default()),
            fs: Arc::new(MemoryFs::default()),
            sleeper: Arc::new(RecordingSleeper::default()),
            bus: EventBus::new(64),
        }
    }

    fn orchestrator(&self, policy: DeletionPolicy, clock: ScriptedClock) -> UploadOrchestrator {
        let config = config(policy, true);
        let clock = Arc::new(clock);
        let finalizer = RecordingFinalizer::new(
            Arc::new(self.destination.clone()),
            self.source.clone(),
            policy,
            OVERFLOW,
            self.bus.clone(),
        );
        UploadOrchestrator::new(
            Arc::new(self.destination.clone()),
            self.uploader.clone(),
            self.fs.clone(),
            self.sleeper.clone(),
            finalizer,
            PresenceMatcher::new(OVERFLOW),
            TimeBudgetGovernor::new(clock, &config.schedule),
            OrchestratorSettings::from_config(&config),
            self.bus.clone(),
        )
    }

    fn two_lectures(&self) -> Vec<StagedFile> {
        vec![
            staged(&self.fs, "CS101", "r1", "Lecture One"),
            staged(&self.fs, "CS101", "r2", "Lecture Two"),
        ]
    }
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|s| Duration::from_secs(*s)).collect()
}

#[tokio::test]
async fn test_uploads_are_discovered_renamed_and_cleaned_up() {
    let h = Harness::new();
    let mut events = h.bus.subscribe();
    let files = h.two_lectures();
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    let batch = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert_eq!(batch.successful_uploads.len(), 2);
    assert!(batch.failed_uploads.is_empty());
    assert!(batch.undiscovered_uploads.is_empty());
    assert_eq!(h.destination.names_in(FOLDER), vec!["Lecture-One", "Lecture-Two"]);
    assert_eq!(h.source.deleted(), vec!["r1", "r2"]);
    assert!(h.fs.paths().is_empty());
    assert!(ctx.undiscovered_folders.is_empty());

    // Two duplicate checks and one discovery listing.
    assert_eq!(h.destination.count_calls(&format!("list:{}", FOLDER)), 3);
    assert_eq!(h.sleeper.slept(), secs(&[50, 50]));

    assert_eq!(ctx.lifecycles.len(), 2);
    for lifecycle in &ctx.lifecycles {
        assert_eq!(lifecycle.state(), LifecycleState::LocallyDeleted);
        assert!(lifecycle.was(LifecycleState::Renamed));
        assert!(lifecycle.was(LifecycleState::SourceDeleted));
    }

    let mut uploaded_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CoreEvent::Recording(RecordingEvent::Uploaded { .. })) {
            uploaded_events += 1;
        }
    }
    assert_eq!(uploaded_events, 2);
    assert_eq!(ctx.outcome.successful_uploads.len(), 2);
}

#[tokio::test]
async fn test_overflow_folder_prefixes_label() {
    let h = Harness::new();
    let files = vec![staged(&h.fs, "CS101", "abc123", "Lecture One")];
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    orchestrator
        .process_course(OVERFLOW, &files, &mut ctx)
        .await
        .unwrap();

    assert_eq!(h.destination.names_in(OVERFLOW), vec!["CS101-Lecture-One"]);
    assert!(h.source.deleted().is_empty());
}

#[tokio::test]
async fn test_deletion_policy_matrix() {
    let cases = [
        (policy(false, false), FOLDER, false),
        (policy(false, true), OVERFLOW, false),
        (policy(true, false), FOLDER, true),
        (policy(true, false), OVERFLOW, false),
        (policy(true, true), OVERFLOW, true),
    ];

    for (policy, folder, expect_delete) in cases {
        let h = Harness::new();
        let files = vec![staged(&h.fs, "CS101", "r1", "Lecture One")];
        let orchestrator = h.orchestrator(policy, ScriptedClock::never());
        let mut ctx = RunContext::new();

        orchestrator
            .process_course(folder, &files, &mut ctx)
            .await
            .unwrap();

        assert_eq!(
            !h.source.deleted().is_empty(),
            expect_delete,
            "policy {:?} in {}",
            policy,
            folder
        );
    }
}

#[tokio::test]
async fn test_failed_upload_is_deleted_everywhere() {
    let h = Harness::new();
    let files = h.two_lectures();
    h.uploader.fail(&files[1].file_name());
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    let batch = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert_eq!(batch.failed_uploads, vec![files[1].path.clone()]);
    assert!(batch.failed_deletions.is_empty());
    assert_eq!(h.destination.names_in(FOLDER), vec!["Lecture-One"]);
    assert_eq!(h.source.deleted(), vec!["r1"]);
    assert!(!h.fs.contains(&files[1].path));
    assert_eq!(h.sleeper.slept(), secs(&[50, 100, 50]));

    let failed = ctx
        .lifecycles
        .iter()
        .find(|l| l.file_name() == files[1].file_name())
        .unwrap();
    assert_eq!(failed.state(), LifecycleState::UploadFailed);
}

#[tokio::test]
async fn test_failed_upload_that_cannot_be_deleted_is_recorded() {
    let h = Harness::new();
    let files = vec![staged(&h.fs, "CS101", "r1", "Lecture One")];
    h.uploader.fail(&files[0].file_name());
    h.destination.reject_delete_of(&files[0].file_name());
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    let batch = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert_eq!(batch.failed_uploads, vec![files[0].path.clone()]);
    assert_eq!(batch.failed_deletions, files);
    assert!(!h.fs.contains(&files[0].path));
    assert_eq!(ctx.lifecycles[0].state(), LifecycleState::FailedDeletion);
    // Nothing went up, so there is no discovery wait or listing.
    assert_eq!(h.sleeper.slept(), secs(&[50, 100]));
    assert_eq!(h.destination.count_calls(&format!("list:{}", FOLDER)), 2);
}

#[tokio::test]
async fn test_present_recordings_are_not_uploaded_again() {
    let h = Harness::new();
    let files = vec![staged(&h.fs, "CS101", "r1", "Lecture One")];
    h.destination.add_object(FOLDER, "Lecture-One", true);
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    let batch = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert!(h.uploader.uploaded().is_empty());
    assert_eq!(batch.already_present, vec![files[0].file_name()]);
    assert!(h.source.deleted().is_empty());
    assert!(!h.fs.contains(&files[0].path));
    assert_eq!(h.sleeper.slept(), secs(&[50]));
}

#[tokio::test]
async fn test_processed_residue_is_finalised() {
    let h = Harness::new();
    let files = vec![staged(&h.fs, "CS101", "r1", "Lecture One")];
    h.destination.add_object(FOLDER, &files[0].file_name(), true);
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert!(h.uploader.uploaded().is_empty());
    assert_eq!(h.destination.names_in(FOLDER), vec!["Lecture-One"]);
    assert_eq!(h.source.deleted(), vec!["r1"]);
    assert_eq!(ctx.lifecycles[0].state(), LifecycleState::LocallyDeleted);
}

#[tokio::test]
async fn test_unprocessed_residue_is_deleted() {
    let h = Harness::new();
    let files = vec![staged(&h.fs, "CS101", "r1", "Lecture One")];
    h.destination.add_object(FOLDER, &files[0].file_name(), false);
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    let batch = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert_eq!(h.destination.object_count(), 0);
    assert!(batch.failed_deletions.is_empty());
    assert!(h.source.deleted().is_empty());
    assert!(h.uploader.uploaded().is_empty());
}

#[tokio::test]
async fn test_unprocessed_residue_that_cannot_be_deleted_is_recorded() {
    let h = Harness::new();
    let files = vec![staged(&h.fs, "CS101", "r1", "Lecture One")];
    h.destination.add_object(FOLDER, &files[0].file_name(), false);
    h.destination.reject_delete_of(&files[0].file_name());
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    let batch = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert_eq!(batch.failed_deletions, files);
    assert!(batch.failed_uploads.is_empty());
}

#[tokio::test]
async fn test_invisible_upload_becomes_undiscovered() {
    let h = Harness::new();
    h.destination.never_show_uploads();
    let files = vec![staged(&h.fs, "CS101", "r1", "Lecture One")];
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    let batch = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert_eq!(batch.undiscovered_uploads, files);
    assert_eq!(
        ctx.undiscovered_folders.get("CS101").map(String::as_str),
        Some(FOLDER)
    );
    assert!(h.source.deleted().is_empty());
    assert_eq!(
        ctx.lifecycles[0].history().last(),
        Some(&LifecycleState::LocallyDeleted)
    );
    assert!(ctx.lifecycles[0].was(LifecycleState::UndiscoveredUpload));
}

#[tokio::test]
async fn test_cutoff_stops_further_uploads() {
    let h = Harness::new();
    let files = h.two_lectures();
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::trip_after(1));
    let mut ctx = RunContext::new();

    let batch = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap();

    assert!(ctx.controlled_stop);
    assert_eq!(h.uploader.uploaded(), vec![files[0].file_name()]);
    assert_eq!(batch.successful_uploads, vec![files[0].path.clone()]);
}

#[tokio::test]
async fn test_unreachable_destination_aborts() {
    let h = Harness::new();
    h.destination.fail_listing(transport_error);
    let files = h.two_lectures();
    let orchestrator = h.orchestrator(policy(true, false), ScriptedClock::never());
    let mut ctx = RunContext::new();

    let err = orchestrator
        .process_course(FOLDER, &files, &mut ctx)
        .await
        .unwrap_err();

    assert!(!err.is_recoverable());
    assert!(h.uploader.uploaded().is_empty());
    assert_eq!(h.fs.paths().len(), 2);
}
