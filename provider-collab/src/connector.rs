//! Collaborate recordings REST connector.

use async_trait::async_trait;
use bridge_traits::{
    error::Result as BridgeResult,
    http::{HttpClient, HttpMethod, HttpRequest},
    media::SourcePlatform,
};
use core_auth::TokenProvider;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::Result;

pub struct CollabConnector {
    http: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    base_url: String,
}

impl CollabConnector {
    /// `base_url` is the API root, e.g. `https://collab.example.com/collab/api/csa`.
    pub fn new(
        http: Arc<dyn HttpClient>,
        tokens: Arc<dyn TokenProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `true` when the recording is gone afterwards (deleted now or already
    /// missing), `false` when the platform refused.
    #[instrument(skip(self))]
    pub async fn delete(&self, recording_id: &str) -> Result<bool> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/recordings/{}",
            self.base_url,
            urlencoding::encode(recording_id)
        );
        let response = self
            .http
            .execute(HttpRequest::new(HttpMethod::Delete, url).bearer_token(token))
            .await?;

        match response.status {
            200..=299 => {
                info!(recording_id, "Source recording deleted");
                Ok(true)
            }
            404 => {
                info!(recording_id, "Source recording already gone");
                Ok(true)
            }
            status => {
                warn!(recording_id, status, "Source refused deletion");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl SourcePlatform for CollabConnector {
    async fn delete_recording(&self, recording_id: &str) -> BridgeResult<bool> {
        Ok(self.delete(recording_id).await?)
    }
}
