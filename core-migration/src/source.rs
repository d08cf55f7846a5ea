//! Courses, staging, and the local downloads directory.

use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use chrono::NaiveDate;
use core_runtime::logging::strip_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{MigrationError, Result};
use crate::naming::{clean_name, StagedFile, MEDIA_EXTENSION};

/// A source course whose recordings are migrated together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Short code, e.g. `CS101-2024`
    pub label: String,
    /// Full title, used first when searching destination folders
    pub name: String,
}

impl Course {
    pub fn new(label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
        }
    }

    /// Label as it appears inside staged file names.
    pub fn file_label(&self) -> String {
        clean_name(&self.label)
    }
}

/// Inclusive window of recording creation dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(MigrationError::Staging(format!(
                "date range ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Where the list of eligible courses comes from (database, API, fixed list).
#[async_trait]
pub trait CourseSource: Send + Sync {
    async fn list_eligible_courses(&self, range: &DateRange) -> Result<Vec<Course>>;
}

/// Fixed course list, independent of the date range.
#[derive(Debug, Clone, Default)]
pub struct InlineCourseSource {
    courses: Vec<Course>,
}

impl InlineCourseSource {
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }
}

#[async_trait]
impl CourseSource for InlineCourseSource {
    async fn list_eligible_courses(&self, _range: &DateRange) -> Result<Vec<Course>> {
        Ok(self.courses.clone())
    }
}

/// What staging one course produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingResult {
    pub staged: Vec<StagedFile>,
    /// Recording identifiers (or names) that could not be downloaded
    pub failed_downloads: Vec<String>,
}

/// Download side of the source: writes a course's eligible recordings into
/// the downloads directory under their composed names.
#[async_trait]
pub trait RecordingStager: Send + Sync {
    async fn stage_course(&self, course: &Course, range: &DateRange) -> Result<StagingResult>;
}

/// The flat directory staged recordings live in.
pub struct DownloadsDirectory {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
}

impl DownloadsDirectory {
    pub fn new(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every parsable `*.mp4` in the directory. A missing directory is empty.
    pub async fn scan(&self) -> Result<Vec<StagedFile>> {
        let exists = self
            .fs
            .exists(&self.path)
            .await
            .map_err(|source| MigrationError::LocalIo {
                path: self.path.clone(),
                source,
            })?;
        if !exists {
            return Ok(Vec::new());
        }

        let entries = self
            .fs
            .list_directory(&self.path)
            .await
            .map_err(|source| MigrationError::LocalIo {
                path: self.path.clone(),
                source,
            })?;

        let mut staged = Vec::new();
        for entry in entries {
            let is_media = entry
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(MEDIA_EXTENSION))
                .unwrap_or(false);
            if !is_media {
                continue;
            }
            match StagedFile::from_path(&entry) {
                Ok(file) => staged.push(file),
                Err(e) => warn!(
                    file = %strip_path(&entry.to_string_lossy()),
                    error = %e,
                    "Skipping unrecognised download"
                ),
            }
        }
        debug!(count = staged.len(), dir = %self.path.display(), "Scanned downloads");
        Ok(staged)
    }

    /// Remove every file in the directory, returning how many went.
    pub async fn clear(&self) -> Result<usize> {
        if !self
            .fs
            .exists(&self.path)
            .await
            .map_err(|source| MigrationError::LocalIo {
                path: self.path.clone(),
                source,
            })?
        {
            return Ok(0);
        }

        let entries = self
            .fs
            .list_directory(&self.path)
            .await
            .map_err(|source| MigrationError::LocalIo {
                path: self.path.clone(),
                source,
            })?;

        let mut removed = 0;
        for entry in entries {
            match self.fs.delete_file(&entry).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.display(), error = %e, "Could not remove download"),
            }
        }
        Ok(removed)
    }
}

/// Group staged files by destination folder.
///
/// `mapping` is keyed by raw course label; a file belongs to a label when the
/// cleaned label equals the label field of its name. Files whose label has no
/// mapping are left out.
pub fn group_by_container(
    files: Vec<StagedFile>,
    mapping: &BTreeMap<String, String>,
) -> BTreeMap<String, Vec<StagedFile>> {
    let by_file_label: BTreeMap<String, &String> = mapping
        .iter()
        .map(|(label, folder)| (clean_name(label), folder))
        .collect();

    let mut groups: BTreeMap<String, Vec<StagedFile>> = BTreeMap::new();
    for file in files {
        if let Some(folder) = by_file_label.get(&file.course_label) {
            groups.entry((*folder).clone()).or_default().push(file);
        }
    }
    groups
}

/// Carry creation timestamps from staging onto scanned files.
pub fn attach_created_at(scanned: Vec<StagedFile>, staged: &[StagedFile]) -> Vec<StagedFile> {
    let known: BTreeMap<&str, _> = staged
        .iter()
        .filter_map(|f| f.created_at.map(|at| (f.recording_id.as_str(), at)))
        .collect();

    scanned
        .into_iter()
        .map(|file| {
            let created_at = known.get(file.recording_id.as_str()).copied().or(file.created_at);
            file.with_created_at(created_at)
        })
        .collect()
}
