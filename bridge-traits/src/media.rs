//! Remote Media Platform Abstractions
//!
//! Contracts for the two remote systems a migration talks to. Provider crates
//! implement them; the migration engine only ever sees these traits, which
//! keeps it testable with in-memory doubles.
//!
//! Implementations are expected to absorb transient faults (auth expiry,
//! throttling, server errors) themselves. Errors that reach the caller are
//! either [`BridgeError::RemoteRejected`](crate::error::BridgeError::RemoteRejected)
//! for a permanent fault on that one request, or something the engine should
//! treat as fatal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Status code the destination reports once an upload has been fully received.
pub const UPLOAD_COMPLETE: i32 = 4;

/// A container (folder) on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationFolder {
    pub id: String,
    pub name: String,
}

/// An object (session) currently visible on the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationObject {
    pub id: String,
    /// Either the long composed file name (not renamed yet) or the canonical name
    pub name: String,
    /// Server-side processing finished (a duration is known)
    pub processed: bool,
}

/// Result reported by the upload transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub code: i32,
    pub name: String,
}

impl UploadStatus {
    pub fn complete() -> Self {
        Self {
            code: UPLOAD_COMPLETE,
            name: "Complete".to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.code == UPLOAD_COMPLETE
    }
}

/// Folder and session operations on the destination video platform.
#[async_trait]
pub trait DestinationPlatform: Send + Sync {
    /// Free-text folder search. Order is the platform's.
    async fn search_folders(&self, query: &str) -> Result<Vec<DestinationFolder>>;

    /// Every object currently inside `folder_id`.
    async fn list_folder_objects(&self, folder_id: &str) -> Result<Vec<DestinationObject>>;

    /// Free-text object search across all folders. Order is the platform's.
    async fn search_objects(&self, query: &str) -> Result<Vec<DestinationObject>>;

    /// Fresh state of a single object.
    async fn get_object(&self, object_id: &str) -> Result<DestinationObject>;

    async fn rename_object(&self, object_id: &str, name: &str) -> Result<()>;

    async fn delete_object(&self, object_id: &str) -> Result<()>;
}

/// Byte-level upload of a staged file into a destination folder.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(
        &self,
        path: &Path,
        created_at: Option<DateTime<Utc>>,
        folder_id: &str,
    ) -> Result<UploadStatus>;
}

/// Recording operations on the source platform.
#[async_trait]
pub trait SourcePlatform: Send + Sync {
    /// Delete a recording. `Ok(false)` means the source refused; an already
    /// missing recording counts as deleted.
    async fn delete_recording(&self, recording_id: &str) -> Result<bool>;
}
