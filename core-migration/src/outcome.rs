//! Per-run accumulators.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::lifecycle::RecordingLifecycle;
use crate::matcher::UndiscoveredFolders;
use crate::naming::StagedFile;

/// What happened to each recording, by category.
///
/// Observational only: nothing here owns a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub failed_downloads: Vec<String>,
    pub failed_uploads: Vec<PathBuf>,
    /// Uploaded but not visible after the processing wait
    pub undiscovered_uploads: Vec<StagedFile>,
    pub successful_uploads: Vec<PathBuf>,
    /// Names already on the destination before uploading
    pub already_present: Vec<String>,
    /// Destination objects that still need deleting
    pub failed_deletions: Vec<StagedFile>,
    /// Source recordings the platform refused to delete
    pub failed_source_deletions: Vec<String>,
}

impl RunOutcome {
    pub fn merge(&mut self, other: RunOutcome) {
        self.failed_downloads.extend(other.failed_downloads);
        self.failed_uploads.extend(other.failed_uploads);
        self.undiscovered_uploads.extend(other.undiscovered_uploads);
        self.successful_uploads.extend(other.successful_uploads);
        self.already_present.extend(other.already_present);
        self.failed_deletions.extend(other.failed_deletions);
        self.failed_source_deletions.extend(other.failed_source_deletions);
    }

    pub fn is_failed_upload(&self, file: &StagedFile) -> bool {
        self.failed_uploads.iter().any(|p| *p == file.path)
    }

    /// Nothing left for the sweep.
    pub fn is_settled(&self) -> bool {
        self.undiscovered_uploads.is_empty() && self.failed_deletions.is_empty()
    }
}

/// Shared mutable state of one run, passed explicitly to the orchestrator and
/// the sweep.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    /// Finished courses
    pub outcome: RunOutcome,
    /// Course currently in the orchestrator
    pub course: RunOutcome,
    pub undiscovered_folders: UndiscoveredFolders,
    pub missing_folders: Vec<String>,
    pub controlled_stop: bool,
    pub lifecycles: Vec<RecordingLifecycle>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            outcome: RunOutcome::default(),
            course: RunOutcome::default(),
            undiscovered_folders: UndiscoveredFolders::new(),
            missing_folders: Vec::new(),
            controlled_stop: false,
            lifecycles: Vec::new(),
        }
    }

    /// Move the in-progress course into the run totals and hand back its lists.
    pub fn finish_course(&mut self) -> RunOutcome {
        let course = std::mem::take(&mut self.course);
        self.outcome.merge(course.clone());
        course
    }

    /// Everything accumulated so far, the interrupted course included.
    pub fn snapshot(&self) -> RunOutcome {
        let mut all = self.outcome.clone();
        all.merge(self.course.clone());
        all
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
