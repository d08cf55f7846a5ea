//! # Recording Lifecycle
//!
//! Validated state transitions for one staged file.
//!
//! ## State Machine
//!
//! ```text
//! Staged → DuplicateChecked ─┬→ Uploading ─┬→ Uploaded → AwaitingDiscovery ─┬→ Discovered
//!                            │             └→ UploadFailed ─→ FailedDeletion └→ UndiscoveredUpload
//!                            ├→ Discovered            (present but unrenamed, processed)
//!                            ├→ FailedDeletion        (unprocessed residue could not be deleted)
//!                            └→ LocallyDeleted        (already on the destination)
//!
//! Discovered → Renamed → SourceDeleted → LocallyDeleted
//! ```
//!
//! `UploadFailed` never reaches `LocallyDeleted`: the local copy of a failed
//! upload is discarded as part of the failure handling, not as a completed
//! transfer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MigrationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Staged,
    DuplicateChecked,
    Uploading,
    UploadFailed,
    Uploaded,
    AwaitingDiscovery,
    Discovered,
    Renamed,
    SourceDeleted,
    LocallyDeleted,
    /// Uploaded but not visible after the processing wait
    UndiscoveredUpload,
    /// A destination or source deletion call failed
    FailedDeletion,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Staged => "staged",
            LifecycleState::DuplicateChecked => "duplicate_checked",
            LifecycleState::Uploading => "uploading",
            LifecycleState::UploadFailed => "upload_failed",
            LifecycleState::Uploaded => "uploaded",
            LifecycleState::AwaitingDiscovery => "awaiting_discovery",
            LifecycleState::Discovered => "discovered",
            LifecycleState::Renamed => "renamed",
            LifecycleState::SourceDeleted => "source_deleted",
            LifecycleState::LocallyDeleted => "locally_deleted",
            LifecycleState::UndiscoveredUpload => "undiscovered_upload",
            LifecycleState::FailedDeletion => "failed_deletion",
        }
    }

    /// No further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::LocallyDeleted)
    }

    fn can_transition_to(&self, to: LifecycleState) -> bool {
        use LifecycleState::*;

        matches!(
            (self, to),
            (Staged, DuplicateChecked)
                | (DuplicateChecked, Uploading)
                | (DuplicateChecked, Discovered)
                | (DuplicateChecked, FailedDeletion)
                | (DuplicateChecked, LocallyDeleted)
                | (Uploading, Uploaded)
                | (Uploading, UploadFailed)
                | (UploadFailed, FailedDeletion)
                | (Uploaded, AwaitingDiscovery)
                | (Uploaded, LocallyDeleted)
                | (AwaitingDiscovery, Discovered)
                | (AwaitingDiscovery, UndiscoveredUpload)
                | (UndiscoveredUpload, Discovered)
                | (UndiscoveredUpload, LocallyDeleted)
                | (Discovered, Renamed)
                | (Discovered, LocallyDeleted)
                | (Renamed, SourceDeleted)
                | (Renamed, FailedDeletion)
                | (Renamed, LocallyDeleted)
                | (SourceDeleted, LocallyDeleted)
                | (FailedDeletion, LocallyDeleted)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one staged file through the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingLifecycle {
    file_name: String,
    state: LifecycleState,
    history: Vec<LifecycleState>,
}

impl RecordingLifecycle {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            state: LifecycleState::Staged,
            history: vec![LifecycleState::Staged],
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every state visited, oldest first.
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidStateTransition`] for a move the
    /// state machine does not allow.
    pub fn advance(&mut self, to: LifecycleState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(MigrationError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!("{} cannot move from {} to {}", self.file_name, self.state, to),
            });
        }
        if to == LifecycleState::LocallyDeleted && self.was(LifecycleState::UploadFailed) {
            return Err(MigrationError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!("{} failed to upload", self.file_name),
            });
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    pub fn was(&self, state: LifecycleState) -> bool {
        self.history.contains(&state)
    }
}
