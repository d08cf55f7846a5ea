//! JWT-bearer grant for the source platform.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    http::{HttpClient, HttpMethod, HttpRequest},
    time::Clock,
};
use chrono::Duration;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::provider::TokenProvider;
use crate::types::{AccessToken, TokenResponse};

const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of the signed assertion itself.
const ASSERTION_TTL_SECS: i64 = 300;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    exp: i64,
}

/// Key and secret issued by the source platform.
#[derive(Clone)]
pub struct JwtBearerCredentials {
    pub token_url: String,
    pub key: String,
    pub secret: String,
}

impl JwtBearerCredentials {
    pub fn for_source(base_url: &str, key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token_url: format!("{}/token", base_url.trim_end_matches('/')),
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for JwtBearerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtBearerCredentials")
            .field("token_url", &self.token_url)
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Exchanges an HS256-signed assertion for a bearer token, caching it until
/// the advertised expiry.
pub struct JwtBearerTokenProvider {
    credentials: JwtBearerCredentials,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<AccessToken>>,
}

impl JwtBearerTokenProvider {
    pub fn new(
        credentials: JwtBearerCredentials,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            http_client,
            clock,
            cached: Mutex::new(None),
        }
    }

    fn assertion(&self) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.credentials.key,
            sub: &self.credentials.key,
            exp: self.clock.unix_timestamp() + ASSERTION_TTL_SECS,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.credentials.secret.as_bytes()),
        )
        .map_err(|e| AuthError::InvalidResponse(format!("Failed to sign assertion: {}", e)))
    }

    #[instrument(skip(self), fields(key = %self.credentials.key))]
    async fn acquire(&self) -> Result<AccessToken> {
        let assertion = self.assertion()?;
        let form = serde_urlencoded::to_string([
            ("grant_type", GRANT_TYPE),
            ("assertion", assertion.as_str()),
        ])
        .map_err(|e| AuthError::InvalidResponse(format!("Failed to encode token request: {}", e)))?;

        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.key, self.credentials.secret
        ));
        let request = HttpRequest::new(HttpMethod::Post, self.credentials.token_url.clone())
            .header("Authorization", format!("Basic {}", basic))
            .form(form);

        debug!("Requesting source session token");
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "Source token request rejected");
            return Err(AuthError::TokenRequestFailed {
                status: response.status,
                message: response.text().unwrap_or_default(),
            });
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let expires_at = body
            .expires_in
            .map(|secs| self.clock.now() + Duration::seconds(secs));
        info!("Source session token acquired");
        Ok(AccessToken::new(body.access_token, expires_at))
    }
}

#[async_trait]
impl TokenProvider for JwtBearerTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(self.clock.now(), Duration::zero()) {
                return Ok(token.secret().to_string());
            }
        }
        let token = self.acquire().await?;
        let secret = token.secret().to_string();
        *cached = Some(token);
        Ok(secret)
    }

    async fn refresh(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let token = self.acquire().await?;
        let secret = token.secret().to_string();
        *cached = Some(token);
        Ok(secret)
    }
}
