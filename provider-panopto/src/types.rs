//! Panopto REST API response types

use bridge_traits::media::{DestinationFolder, DestinationObject};
use serde::{Deserialize, Serialize};

/// Paged envelope returned by search and listing endpoints.
#[derive(Debug, Deserialize)]
pub struct PagedResults<T> {
    #[serde(rename = "Results", default = "Vec::new")]
    pub results: Vec<T>,
}

/// Session resource (a recording on the destination).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "Id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    /// Seconds; absent until processing finishes
    #[serde(rename = "Duration", default)]
    pub duration: Option<f64>,

    #[serde(rename = "FolderDetails", default)]
    pub folder: Option<FolderRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRef {
    #[serde(rename = "Id")]
    pub id: String,
}

/// Folder resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    #[serde(rename = "Id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,
}

/// Body of `PUT /sessions/{id}`.
#[derive(Debug, Serialize)]
pub struct SessionUpdate<'a> {
    #[serde(rename = "Name")]
    pub name: &'a str,
}

impl From<Session> for DestinationObject {
    fn from(session: Session) -> Self {
        DestinationObject {
            id: session.id,
            name: session.name,
            processed: session.duration.is_some(),
        }
    }
}

impl From<Folder> for DestinationFolder {
    fn from(folder: Folder) -> Self {
        DestinationFolder {
            id: folder.id,
            name: folder.name,
        }
    }
}
