//! In-memory doubles shared by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    media::{
        DestinationFolder, DestinationObject, DestinationPlatform, MediaUploader, SourcePlatform,
        UploadStatus,
    },
    storage::{FileMetadata, FileSystemAccess},
    time::{Clock, Sleeper},
};
use bytes::Bytes;
use chrono::{DateTime, NaiveTime, Utc};
use core_migration::{
    Course, DateRange, FolderMapping, FolderMappingStore, MigrationError, RecordingStager,
    StagedFile, StagingResult,
};
use core_runtime::config::{DeletionPolicy, MigrationConfig, TimingSettings};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OVERFLOW: &str = "overflow-folder";
pub const DOWNLOADS: &str = "/downloads";

// ============================================================================
// Destination
// ============================================================================

#[derive(Debug, Clone)]
struct StoredObject {
    object: DestinationObject,
    folder_id: String,
    /// Listings of its folder that still hide it
    hidden_for: usize,
}

#[derive(Default)]
struct DestinationState {
    folders: Vec<DestinationFolder>,
    objects: Vec<StoredObject>,
    next_id: usize,
    /// Listings an upload stays invisible for; `usize::MAX` never shows
    upload_lag: usize,
    reject_delete: HashSet<String>,
    fail_listing: Option<fn(&str) -> BridgeError>,
    calls: Vec<String>,
}

/// Destination platform with folders, sessions and configurable lag.
#[derive(Clone, Default)]
pub struct FakeDestination {
    state: Arc<Mutex<DestinationState>>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, id: &str, name: &str) {
        self.state.lock().unwrap().folders.push(DestinationFolder {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Place an object as if an earlier run had uploaded it.
    pub fn add_object(&self, folder_id: &str, name: &str, processed: bool) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("session-{}", state.next_id);
        state.objects.push(StoredObject {
            object: DestinationObject {
                id: id.clone(),
                name: name.to_string(),
                processed,
            },
            folder_id: folder_id.to_string(),
            hidden_for: 0,
        });
        id
    }

    pub fn set_upload_lag(&self, listings: usize) {
        self.state.lock().unwrap().upload_lag = listings;
    }

    pub fn never_show_uploads(&self) {
        self.set_upload_lag(usize::MAX);
    }

    /// Make every hidden object visible.
    pub fn reveal_all(&self) {
        for stored in &mut self.state.lock().unwrap().objects {
            stored.hidden_for = 0;
        }
    }

    pub fn reject_delete_of(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .reject_delete
            .insert(name.to_string());
    }

    pub fn allow_all_deletes(&self) {
        self.state.lock().unwrap().reject_delete.clear();
    }

    pub fn fail_listing(&self, error: fn(&str) -> BridgeError) {
        self.state.lock().unwrap().fail_listing = Some(error);
    }

    pub fn heal_listing(&self) {
        self.state.lock().unwrap().fail_listing = None;
    }

    pub fn names_in(&self, folder_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .objects
            .iter()
            .filter(|s| s.folder_id == folder_id)
            .map(|s| s.object.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn put_upload(&self, folder_id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("session-{}", state.next_id);
        let hidden_for = state.upload_lag;
        state.objects.push(StoredObject {
            object: DestinationObject {
                id,
                name: name.to_string(),
                processed: true,
            },
            folder_id: folder_id.to_string(),
            hidden_for,
        });
    }
}

#[async_trait]
impl DestinationPlatform for FakeDestination {
    async fn search_folders(&self, query: &str) -> BridgeResult<Vec<DestinationFolder>> {
        self.record(format!("search_folders:{}", query));
        Ok(self
            .state
            .lock()
            .unwrap()
            .folders
            .iter()
            .filter(|f| f.name == query)
            .cloned()
            .collect())
    }

    async fn list_folder_objects(&self, folder_id: &str) -> BridgeResult<Vec<DestinationObject>> {
        self.record(format!("list:{}", folder_id));
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_listing {
            return Err(error(folder_id));
        }
        let mut visible = Vec::new();
        for stored in state.objects.iter_mut().filter(|s| s.folder_id == folder_id) {
            if stored.hidden_for == 0 {
                visible.push(stored.object.clone());
            } else if stored.hidden_for != usize::MAX {
                stored.hidden_for -= 1;
            }
        }
        Ok(visible)
    }

    async fn search_objects(&self, query: &str) -> BridgeResult<Vec<DestinationObject>> {
        self.record(format!("search_objects:{}", query));
        Ok(self
            .state
            .lock()
            .unwrap()
            .objects
            .iter()
            .filter(|s| s.object.name == query)
            .map(|s| s.object.clone())
            .collect())
    }

    async fn get_object(&self, object_id: &str) -> BridgeResult<DestinationObject> {
        self.record(format!("get:{}", object_id));
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .find(|s| s.object.id == object_id)
            .map(|s| s.object.clone())
            .ok_or_else(|| BridgeError::RemoteRejected {
                status: 404,
                message: object_id.to_string(),
            })
    }

    async fn rename_object(&self, object_id: &str, name: &str) -> BridgeResult<()> {
        self.record(format!("rename:{}:{}", object_id, name));
        let mut state = self.state.lock().unwrap();
        match state.objects.iter_mut().find(|s| s.object.id == object_id) {
            Some(stored) => {
                stored.object.name = name.to_string();
                Ok(())
            }
            None => Err(BridgeError::RemoteRejected {
                status: 404,
                message: object_id.to_string(),
            }),
        }
    }

    async fn delete_object(&self, object_id: &str) -> BridgeResult<()> {
        self.record(format!("delete:{}", object_id));
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.objects.iter().position(|s| s.object.id == object_id) else {
            return Err(BridgeError::RemoteRejected {
                status: 404,
                message: object_id.to_string(),
            });
        };
        if state.reject_delete.contains(&state.objects[pos].object.name) {
            return Err(BridgeError::RemoteRejected {
                status: 403,
                message: "delete refused".to_string(),
            });
        }
        state.objects.remove(pos);
        Ok(())
    }
}

pub fn transport_error(folder_id: &str) -> BridgeError {
    BridgeError::Transport {
        url: format!("https://dst/folders/{}/sessions", folder_id),
        message: "connection reset".to_string(),
    }
}

pub fn rejected(folder_id: &str) -> BridgeError {
    BridgeError::RemoteRejected {
        status: 403,
        message: format!("forbidden: {}", folder_id),
    }
}

// ============================================================================
// Uploader
// ============================================================================

/// Puts uploads on the fake destination under the local file name.
pub struct FakeUploader {
    destination: FakeDestination,
    failing: Mutex<HashSet<String>>,
    /// Upload leaves a partial object even when it fails
    leave_partial: bool,
    pub uploads: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
}

impl FakeUploader {
    pub fn new(destination: FakeDestination) -> Self {
        Self {
            destination,
            failing: Mutex::new(HashSet::new()),
            leave_partial: true,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self, file_name: &str) {
        self.failing.lock().unwrap().insert(file_name.to_string());
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl MediaUploader for FakeUploader {
    async fn upload(
        &self,
        path: &Path,
        created_at: Option<DateTime<Utc>>,
        folder_id: &str,
    ) -> BridgeResult<UploadStatus> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.uploads.lock().unwrap().push((name.clone(), created_at));

        let failed = self.failing.lock().unwrap().contains(&name);
        if !failed || self.leave_partial {
            self.destination.put_upload(folder_id, &name);
        }
        if failed {
            Ok(UploadStatus {
                code: 5,
                name: "Error".to_string(),
            })
        } else {
            Ok(UploadStatus::complete())
        }
    }
}

// ============================================================================
// Source
// ============================================================================

#[derive(Default)]
pub struct FakeSource {
    refuse: Mutex<HashSet<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn refuse(&self, recording_id: &str) {
        self.refuse.lock().unwrap().insert(recording_id.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourcePlatform for FakeSource {
    async fn delete_recording(&self, recording_id: &str) -> BridgeResult<bool> {
        if self.refuse.lock().unwrap().contains(recording_id) {
            return Ok(false);
        }
        self.deleted.lock().unwrap().push(recording_id.to_string());
        Ok(true)
    }
}

// ============================================================================
// Local disk
// ============================================================================

/// Flat in-memory file system.
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, Bytes>>,
    listings: AtomicUsize,
    /// 1-based index of the directory listing that fails with `Io`
    broken_listing: Mutex<Option<usize>>,
}

impl MemoryFs {
    pub fn break_listing(&self, nth: usize) {
        *self.broken_listing.lock().unwrap() = Some(nth);
    }

    pub fn touch(&self, path: impl Into<PathBuf>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), Bytes::from_static(b"mp4"));
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFs {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        let files = self.files.lock().unwrap();
        Ok(files.contains_key(path) || files.keys().any(|p| p.parent() == Some(path)))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        let files = self.files.lock().unwrap();
        let data = files
            .get(path)
            .ok_or_else(|| BridgeError::OperationFailed(format!("missing {}", path.display())))?;
        Ok(FileMetadata {
            size: data.len() as u64,
            created_at: None,
            modified_at: None,
            is_directory: false,
        })
    }

    async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                BridgeError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    path.display().to_string(),
                ))
            })
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.files.lock().unwrap().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        match self.files.lock().unwrap().remove(path) {
            Some(_) => Ok(()),
            None => Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            ))),
        }
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        let nth = self.listings.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.broken_listing.lock().unwrap() == Some(nth) {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                path.display().to_string(),
            )));
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Time
// ============================================================================

/// Records requested sleeps instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Reports 22:00 until `trip_after` time-of-day reads, then 23:30.
pub struct ScriptedClock {
    reads: AtomicUsize,
    trip_after: usize,
}

impl ScriptedClock {
    pub fn never() -> Self {
        Self::trip_after(usize::MAX)
    }

    pub fn trip_after(reads: usize) -> Self {
        Self {
            reads: AtomicUsize::new(0),
            trip_after: reads,
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn time_of_day(&self) -> NaiveTime {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        if read >= self.trip_after {
            NaiveTime::from_hms_opt(23, 30, 0).unwrap()
        } else {
            NaiveTime::from_hms_opt(22, 0, 0).unwrap()
        }
    }
}

// ============================================================================
// Staging and mapping
// ============================================================================

/// Drops pre-arranged recordings into the in-memory downloads directory.
pub struct FakeStager {
    fs: Arc<MemoryFs>,
    recordings: Mutex<HashMap<String, Vec<(String, String)>>>,
    broken: Mutex<HashSet<String>>,
    pub failed: Mutex<Vec<String>>,
}

impl FakeStager {
    pub fn new(fs: Arc<MemoryFs>) -> Self {
        Self {
            fs,
            recordings: Mutex::new(HashMap::new()),
            broken: Mutex::new(HashSet::new()),
            failed: Mutex::new(Vec::new()),
        }
    }

    /// Register a recording `(id, title)` for the course `label`.
    pub fn add(&self, label: &str, recording_id: &str, title: &str) {
        self.recordings
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push((recording_id.to_string(), title.to_string()));
    }

    /// Staging `label` fails with an unrecoverable error.
    pub fn break_course(&self, label: &str) {
        self.broken.lock().unwrap().insert(label.to_string());
    }

    pub fn repair(&self) {
        self.broken.lock().unwrap().clear();
    }
}

#[async_trait]
impl RecordingStager for FakeStager {
    async fn stage_course(
        &self,
        course: &Course,
        _range: &DateRange,
    ) -> core_migration::Result<StagingResult> {
        if self.broken.lock().unwrap().contains(&course.label) {
            return Err(MigrationError::Staging(format!(
                "recording list unavailable for {}",
                course.label
            )));
        }
        let recordings = self
            .recordings
            .lock()
            .unwrap()
            .get(&course.label)
            .cloned()
            .unwrap_or_default();
        let mut staged = Vec::new();
        for (id, title) in recordings {
            let file = StagedFile::compose(Path::new(DOWNLOADS), &course.label, &id, &title, None);
            self.fs.touch(file.path.clone());
            staged.push(file);
        }
        Ok(StagingResult {
            staged,
            failed_downloads: self.failed.lock().unwrap().clone(),
        })
    }
}

#[derive(Default)]
pub struct MemoryMappingStore {
    pub mapping: Mutex<FolderMapping>,
    pub clears: AtomicUsize,
}

#[async_trait]
impl FolderMappingStore for MemoryMappingStore {
    async fn load(&self) -> core_migration::Result<FolderMapping> {
        Ok(self.mapping.lock().unwrap().clone())
    }

    async fn save(&self, mapping: &FolderMapping) -> core_migration::Result<()> {
        *self.mapping.lock().unwrap() = mapping.clone();
        Ok(())
    }

    async fn clear(&self) -> core_migration::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.mapping.lock().unwrap().clear();
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn staged(fs: &MemoryFs, label: &str, id: &str, title: &str) -> StagedFile {
    let file = StagedFile::compose(Path::new(DOWNLOADS), label, id, title, None);
    fs.touch(file.path.clone());
    file
}

pub fn policy(delete_source: bool, delete_unmapped: bool) -> DeletionPolicy {
    DeletionPolicy {
        delete_local_recordings: true,
        delete_source_recordings: delete_source,
        delete_unmapped_source_recordings: delete_unmapped,
    }
}

pub fn config(policy: DeletionPolicy, scheduled_run: bool) -> MigrationConfig {
    MigrationConfig::builder()
        .destination_server("dst.example.edu")
        .destination_client("client", "client-secret")
        .destination_account("svc", "pw")
        .default_folder(OVERFLOW, "Unmapped recordings")
        .source_base_url("https://src.example.edu")
        .source_credentials("key", "secret")
        .downloads_dir(DOWNLOADS)
        .data_dir("/data")
        .policy(policy)
        .timing(TimingSettings {
            processing_wait_secs: 50,
            restart_cooldown_secs: 3600,
            sweep_wait_multiplier: 4,
            failed_upload_wait_multiplier: 2,
        })
        .scheduled_run(scheduled_run)
        .controlled_stop_time("23:00:00")
        .sweep_rounds(2)
        .build()
        .unwrap()
}

pub fn range() -> DateRange {
    DateRange::new(
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        chrono::NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .unwrap()
}

pub fn names(files: &[StagedFile]) -> BTreeSet<String> {
    files.iter().map(|f| f.file_name()).collect()
}
