//! Panopto REST connector.

use async_trait::async_trait;
use bridge_traits::{
    error::Result as BridgeResult,
    http::{HttpMethod, HttpRequest},
    media::{DestinationFolder, DestinationObject, DestinationPlatform},
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::client::TransientFaultClient;
use crate::error::{PanoptoError, Result};
use crate::types::{Folder, PagedResults, Session, SessionUpdate};

const API_PATH: &str = "/Panopto/api/v1";

/// Hard stop for pagination in case the remote never returns an empty page.
const MAX_PAGES: u32 = 500;

/// Destination platform backed by the Panopto public REST API.
pub struct PanoptoConnector {
    client: TransientFaultClient,
    base_url: String,
}

impl PanoptoConnector {
    /// `base_url` is scheme plus host, e.g. `https://video.example.edu`.
    pub fn new(client: TransientFaultClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PATH, path)
    }

    /// Walk `pageNumber=0..` until an empty page comes back.
    async fn collect_pages<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<Vec<T>> {
        let separator = if path_and_query.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();

        for page in 0..MAX_PAGES {
            let url = format!(
                "{}{}pageNumber={}",
                self.api_url(path_and_query),
                separator,
                page
            );
            let response = self
                .client
                .call_limited(HttpRequest::new(HttpMethod::Get, url))
                .await?;
            let parsed: PagedResults<T> = serde_json::from_slice(&response.body)
                .map_err(|e| PanoptoError::ParseError(e.to_string()))?;

            if parsed.results.is_empty() {
                return Ok(items);
            }
            items.extend(parsed.results);
        }

        debug!(path = path_and_query, "Stopped paging at page limit");
        Ok(items)
    }

    #[instrument(skip(self))]
    pub async fn search_folders(&self, query: &str) -> Result<Vec<Folder>> {
        let path = format!(
            "/folders/search?searchQuery={}",
            urlencoding::encode(query)
        );
        self.collect_pages(&path).await
    }

    #[instrument(skip(self))]
    pub async fn search_sessions(&self, query: &str) -> Result<Vec<Session>> {
        let path = format!(
            "/sessions/search?searchQuery={}",
            urlencoding::encode(query)
        );
        self.collect_pages(&path).await
    }

    #[instrument(skip(self))]
    pub async fn folder_sessions(&self, folder_id: &str) -> Result<Vec<Session>> {
        let path = format!("/folders/{}/sessions", urlencoding::encode(folder_id));
        self.collect_pages(&path).await
    }

    #[instrument(skip(self))]
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        let url = self.api_url(&format!("/sessions/{}", urlencoding::encode(session_id)));
        let response = self
            .client
            .call(HttpRequest::new(HttpMethod::Get, url))
            .await?;
        serde_json::from_slice(&response.body).map_err(|e| PanoptoError::ParseError(e.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn update_session_name(&self, session_id: &str, name: &str) -> Result<()> {
        let url = self.api_url(&format!("/sessions/{}", urlencoding::encode(session_id)));
        let request = HttpRequest::new(HttpMethod::Put, url).json(&SessionUpdate { name })?;
        self.client.call(request).await?;
        info!(session_id, name, "Session renamed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let url = self.api_url(&format!("/sessions/{}", urlencoding::encode(session_id)));
        self.client
            .call(HttpRequest::new(HttpMethod::Delete, url))
            .await?;
        info!(session_id, "Session deleted");
        Ok(())
    }
}

#[async_trait]
impl DestinationPlatform for PanoptoConnector {
    async fn search_folders(&self, query: &str) -> BridgeResult<Vec<DestinationFolder>> {
        let folders = PanoptoConnector::search_folders(self, query).await?;
        Ok(folders.into_iter().map(DestinationFolder::from).collect())
    }

    async fn list_folder_objects(&self, folder_id: &str) -> BridgeResult<Vec<DestinationObject>> {
        let sessions = self.folder_sessions(folder_id).await?;
        Ok(sessions.into_iter().map(DestinationObject::from).collect())
    }

    async fn search_objects(&self, query: &str) -> BridgeResult<Vec<DestinationObject>> {
        let sessions = self.search_sessions(query).await?;
        Ok(sessions.into_iter().map(DestinationObject::from).collect())
    }

    async fn get_object(&self, object_id: &str) -> BridgeResult<DestinationObject> {
        Ok(self.get_session(object_id).await?.into())
    }

    async fn rename_object(&self, object_id: &str, name: &str) -> BridgeResult<()> {
        Ok(self.update_session_name(object_id, name).await?)
    }

    async fn delete_object(&self, object_id: &str) -> BridgeResult<()> {
        Ok(self.delete_session(object_id).await?)
    }
}
