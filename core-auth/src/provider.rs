//! Token acquisition and caching.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    http::{HttpClient, HttpMethod, HttpRequest},
    time::Clock,
};
use chrono::Duration;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::types::{AccessToken, ResourceOwnerCredentials, TokenResponse};

/// Tokens are renewed this long before their advertised expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Source of bearer tokens for a remote platform.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current token, acquiring one if nothing usable is cached.
    async fn access_token(&self) -> Result<String>;

    /// Discard any cached token and acquire a new one.
    async fn refresh(&self) -> Result<String>;
}

/// Resource owner password grant against the destination's token endpoint.
///
/// No retry happens here: the caller (the destination's fault-tolerant
/// client) decides how often a refresh may be attempted.
pub struct PasswordGrantTokenProvider {
    credentials: ResourceOwnerCredentials,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<AccessToken>>,
    event_bus: Option<EventBus>,
}

impl PasswordGrantTokenProvider {
    pub fn new(
        credentials: ResourceOwnerCredentials,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            http_client,
            clock,
            cached: Mutex::new(None),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    #[instrument(skip(self), fields(username = %self.credentials.username))]
    async fn acquire(&self) -> Result<AccessToken> {
        let form = serde_urlencoded::to_string([
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
            ("scope", self.credentials.scope.as_str()),
        ])
        .map_err(|e| AuthError::InvalidResponse(format!("Failed to encode token request: {}", e)))?;

        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        let request = HttpRequest::new(HttpMethod::Post, self.credentials.token_url.clone())
            .header("Authorization", format!("Basic {}", basic))
            .header("Accept", "application/json")
            .form(form);

        debug!(
            client_id = %redact_if_sensitive("client_id", &self.credentials.client_id),
            username = %redact_if_sensitive("username", &self.credentials.username),
            "Requesting access token with resource owner grant"
        );
        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status = response.status, "Token request rejected");
            self.emit(AuthEvent::RefreshFailed {
                provider: "destination".to_string(),
                message: format!("HTTP {}", response.status),
            });
            return Err(AuthError::TokenRequestFailed {
                status: response.status,
                message,
            });
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        if body.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "access_token is empty".to_string(),
            ));
        }

        let expires_at = body
            .expires_in
            .map(|secs| self.clock.now() + Duration::seconds(secs));
        info!(expires_at = ?expires_at, "Access token acquired");
        self.emit(AuthEvent::TokenRefreshed {
            provider: "destination".to_string(),
        });

        Ok(AccessToken::new(body.access_token, expires_at))
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }
}

#[async_trait]
impl TokenProvider for PasswordGrantTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(self.clock.now(), Duration::seconds(EXPIRY_MARGIN_SECS)) {
                return Ok(token.secret().to_string());
            }
            debug!("Cached access token is about to expire");
        }

        let token = self.acquire().await?;
        let secret = token.secret().to_string();
        *cached = Some(token);
        Ok(secret)
    }

    async fn refresh(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        *cached = None;
        let token = self.acquire().await?;
        let secret = token.secret().to_string();
        *cached = Some(token);
        Ok(secret)
    }
}

/// Fixed token obtained out of band (source platform session JWT).
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(AuthError::NotAuthenticated);
        }
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> Result<String> {
        // Nothing to renew; hand back the same session token.
        self.access_token().await
    }
}
