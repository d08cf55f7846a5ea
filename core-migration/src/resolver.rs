//! # Folder Resolver
//!
//! Maps a course to the destination folder its recordings go into.
//!
//! ## Fallback chain
//!
//! 1. Cached mapping for the label
//! 2. Folder search by full course name
//! 3. Folder search by the first 26 characters of the name
//! 4. Folder search by course label
//! 5. The overflow folder; the label is reported as a missing folder
//!
//! The first non-empty search wins and its first hit is taken. The mapping
//! document is rewritten after every batch so a crash does not repeat lookups
//! already made.

use async_trait::async_trait;
use bridge_traits::{media::DestinationPlatform, storage::FileSystemAccess};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{MigrationError, Result};
use crate::source::Course;

/// Characters of the course name used by the second search.
pub const TRUNCATED_NAME_LEN: usize = 26;

/// Course label -> folder id.
pub type FolderMapping = BTreeMap<String, String>;

/// Durable home of the label -> folder mapping.
#[async_trait]
pub trait FolderMappingStore: Send + Sync {
    /// Empty mapping when nothing has been saved yet.
    async fn load(&self) -> Result<FolderMapping>;

    async fn save(&self, mapping: &FolderMapping) -> Result<()>;

    /// Drop the document so the next run re-derives every folder.
    async fn clear(&self) -> Result<()>;
}

/// Mapping kept as one pretty-printed JSON object on disk.
pub struct JsonFileMappingStore {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
}

impl JsonFileMappingStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }
}

#[async_trait]
impl FolderMappingStore for JsonFileMappingStore {
    async fn load(&self) -> Result<FolderMapping> {
        let exists = self
            .fs
            .exists(&self.path)
            .await
            .map_err(|e| MigrationError::MappingStore(e.to_string()))?;
        if !exists {
            return Ok(FolderMapping::new());
        }

        let raw = self
            .fs
            .read_file(&self.path)
            .await
            .map_err(|e| MigrationError::MappingStore(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| {
            MigrationError::MappingStore(format!("{}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, mapping: &FolderMapping) -> Result<()> {
        let json = serde_json::to_vec_pretty(mapping)
            .map_err(|e| MigrationError::MappingStore(e.to_string()))?;
        self.fs
            .write_file(&self.path, Bytes::from(json))
            .await
            .map_err(|e| MigrationError::MappingStore(e.to_string()))
    }

    async fn clear(&self) -> Result<()> {
        self.fs
            .remove_if_exists(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| MigrationError::MappingStore(e.to_string()))
    }
}

/// Which step of the chain produced a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStep {
    Cached,
    FullName,
    TruncatedName,
    Label,
    DefaultFolder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub label: String,
    pub folder_id: String,
    pub step: ResolutionStep,
}

/// Result of resolving a batch of courses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverOutput {
    pub resolutions: Vec<Resolution>,
    /// Labels that ended in the overflow folder
    pub missing_folders: Vec<String>,
}

impl ResolverOutput {
    /// Label -> folder for just this batch.
    pub fn mapping(&self) -> FolderMapping {
        self.resolutions
            .iter()
            .map(|r| (r.label.clone(), r.folder_id.clone()))
            .collect()
    }
}

pub struct FolderResolver {
    destination: Arc<dyn DestinationPlatform>,
    store: Arc<dyn FolderMappingStore>,
    default_folder_id: String,
    mapping: Option<FolderMapping>,
}

impl FolderResolver {
    pub fn new(
        destination: Arc<dyn DestinationPlatform>,
        store: Arc<dyn FolderMappingStore>,
        default_folder_id: impl Into<String>,
    ) -> Self {
        Self {
            destination,
            store,
            default_folder_id: default_folder_id.into(),
            mapping: None,
        }
    }

    /// Everything resolved so far, including what was loaded from the store.
    pub fn known_mapping(&self) -> FolderMapping {
        self.mapping.clone().unwrap_or_default()
    }

    /// Resolve a batch of courses, then persist the updated mapping.
    ///
    /// Search failures propagate; the mapping gathered before the failure is
    /// still saved.
    #[instrument(skip(self, courses), fields(courses = courses.len()))]
    pub async fn resolve_courses(&mut self, courses: &[Course]) -> Result<ResolverOutput> {
        if self.mapping.is_none() {
            self.mapping = Some(self.store.load().await?);
        }

        let mut output = ResolverOutput::default();
        let mut failure = None;
        for course in courses {
            match self.resolve(course).await {
                Ok(resolution) => {
                    if resolution.step == ResolutionStep::DefaultFolder {
                        output.missing_folders.push(course.label.clone());
                    }
                    output.resolutions.push(resolution);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.store.save(&self.known_mapping()).await?;
        match failure {
            Some(e) => Err(e),
            None => Ok(output),
        }
    }

    /// Resolve one course, memoising the answer.
    pub async fn resolve(&mut self, course: &Course) -> Result<Resolution> {
        if let Some(folder_id) = self
            .mapping
            .as_ref()
            .and_then(|m| m.get(&course.label))
            .cloned()
        {
            debug!(label = %course.label, folder_id = %folder_id, "Folder mapping cached");
            return Ok(Resolution {
                label: course.label.clone(),
                folder_id,
                step: ResolutionStep::Cached,
            });
        }

        let truncated: String = course.name.chars().take(TRUNCATED_NAME_LEN).collect();
        let attempts = [
            (ResolutionStep::FullName, course.name.as_str()),
            (ResolutionStep::TruncatedName, truncated.as_str()),
            (ResolutionStep::Label, course.label.as_str()),
        ];

        let mut found = None;
        for (step, query) in attempts {
            if query.trim().is_empty() {
                continue;
            }
            if step == ResolutionStep::TruncatedName && query == course.name {
                continue;
            }
            let hits = self
                .destination
                .search_folders(query)
                .await
                .map_err(MigrationError::destination)?;
            if let Some(first) = hits.into_iter().next() {
                found = Some((step, first.id));
                break;
            }
        }

        let (step, folder_id) = match found {
            Some(hit) => hit,
            None => {
                warn!(label = %course.label, "No destination folder found, using overflow folder");
                (ResolutionStep::DefaultFolder, self.default_folder_id.clone())
            }
        };

        info!(label = %course.label, folder_id = %folder_id, ?step, "Folder resolved");
        self.mapping
            .get_or_insert_with(FolderMapping::new)
            .insert(course.label.clone(), folder_id.clone());
        Ok(Resolution {
            label: course.label.clone(),
            folder_id,
            step,
        })
    }
}
