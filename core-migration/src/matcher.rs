//! # Presence Matcher
//!
//! Decides which staged files already exist in a destination folder.
//!
//! A file counts as present when the folder holds an object named either its
//! long composed name (uploaded, not yet renamed) or its canonical short name
//! (renamed by an earlier run). Matching is by name only and has no side
//! effects on the destination, so running it twice gives the same answer.

use bridge_traits::media::DestinationObject;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::naming::StagedFile;

/// When the check runs relative to the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Before uploading: long-name hits are residue of an interrupted run
    Duplicate,
    /// After uploading: misses are undiscovered uploads
    Discover,
}

/// A staged file found on the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentObject {
    pub file: StagedFile,
    pub object_id: String,
    /// Whichever of the two names matched
    pub matched_name: String,
}

/// Course label -> folder id for every course with an undiscovered upload.
pub type UndiscoveredFolders = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub absent: Vec<StagedFile>,
    pub present: Vec<PresentObject>,
    /// Subset of `present` matched on the long name in duplicate mode
    pub present_unrenamed: Vec<PresentObject>,
}

#[derive(Debug, Clone)]
pub struct PresenceMatcher {
    default_folder_id: String,
}

impl PresenceMatcher {
    pub fn new(default_folder_id: impl Into<String>) -> Self {
        Self {
            default_folder_id: default_folder_id.into(),
        }
    }

    pub fn default_folder_id(&self) -> &str {
        &self.default_folder_id
    }

    pub fn is_overflow(&self, folder_id: &str) -> bool {
        folder_id == self.default_folder_id
    }

    /// Partition `files` against the objects listed in `folder_id`.
    ///
    /// In [`CheckMode::Discover`], every absent file registers its course
    /// label under `folder_id` in `undiscovered` so the sweep knows where to
    /// look again.
    pub fn check(
        &self,
        objects: &[DestinationObject],
        files: &[StagedFile],
        folder_id: &str,
        mode: CheckMode,
        undiscovered: &mut UndiscoveredFolders,
    ) -> MatchOutcome {
        // Last object wins on duplicate names.
        let by_name: HashMap<&str, &str> = objects
            .iter()
            .map(|o| (o.name.as_str(), o.id.as_str()))
            .collect();
        let in_overflow = self.is_overflow(folder_id);

        let mut outcome = MatchOutcome::default();
        for file in files {
            let long_name = file.file_name();
            let short_name = file.canonical_name(in_overflow);

            if let Some(id) = by_name.get(short_name.as_str()) {
                outcome.present.push(PresentObject {
                    file: file.clone(),
                    object_id: id.to_string(),
                    matched_name: short_name,
                });
            } else if let Some(id) = by_name.get(long_name.as_str()) {
                let hit = PresentObject {
                    file: file.clone(),
                    object_id: id.to_string(),
                    matched_name: long_name,
                };
                if mode == CheckMode::Duplicate {
                    outcome.present_unrenamed.push(hit.clone());
                }
                outcome.present.push(hit);
            } else {
                if mode == CheckMode::Discover {
                    undiscovered.insert(file.course_label.clone(), folder_id.to_string());
                }
                outcome.absent.push(file.clone());
            }
        }

        debug!(
            folder_id,
            ?mode,
            absent = outcome.absent.len(),
            present = outcome.present.len(),
            unrenamed = outcome.present_unrenamed.len(),
            "Presence check"
        );
        outcome
    }
}
