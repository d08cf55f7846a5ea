//! Fault-tolerant transport for destination calls.

use bridge_traits::{
    http::{HttpClient, HttpRequest, HttpResponse},
    time::Sleeper,
};
use core_auth::TokenProvider;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{PanoptoError, Result};
use crate::rate_limit::RateLimiter;
use crate::retry::{BackoffStrategy, FaultClass, FixedBackoff, RetryPolicy};

/// Wraps every destination request in the auth / throttle / server-error
/// retry loop.
///
/// A transport failure (no status at all) is not retried here; it propagates
/// so the run can be mitigated and restarted.
pub struct TransientFaultClient {
    http: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    backoff: Arc<dyn BackoffStrategy>,
    limiter: Arc<RateLimiter>,
}

impl TransientFaultClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        tokens: Arc<dyn TokenProvider>,
        sleeper: Arc<dyn Sleeper>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http,
            tokens,
            sleeper,
            policy: RetryPolicy::default(),
            backoff: Arc::new(FixedBackoff::default()),
            limiter,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Send without rate limiting (single-object endpoints).
    pub async fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.send(request, false).await
    }

    /// Send through the shared rate limiter (search and listing endpoints).
    pub async fn call_limited(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.send(request, true).await
    }

    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest, limited: bool) -> Result<HttpResponse> {
        let mut attempts: u32 = 0;
        let mut refreshes: u32 = 0;
        let mut token = self.tokens.access_token().await?;

        loop {
            if limited {
                self.limiter.acquire().await;
            }
            attempts += 1;

            let response = self
                .http
                .execute(request.clone().bearer_token(token.as_str()))
                .await?;

            let class = FaultClass::classify(response.status);
            match class {
                FaultClass::Success => return Ok(response),
                FaultClass::Permanent => {
                    let message = response
                        .text()
                        .unwrap_or_else(|_| "<non-utf8 body>".to_string());
                    debug!(status = response.status, "Non-retryable status");
                    return Err(PanoptoError::ApiError {
                        status_code: response.status,
                        message,
                    });
                }
                FaultClass::Unauthorized => {
                    refreshes += 1;
                    if refreshes > self.policy.max_auth_refreshes {
                        warn!(refreshes, "Unauthorized after repeated token refreshes");
                        return Err(PanoptoError::AuthRefreshLimit {
                            refreshes: refreshes - 1,
                        });
                    }
                    if attempts >= self.policy.max_attempts {
                        return Err(PanoptoError::RetriesExhausted {
                            attempts,
                            last_status: response.status,
                        });
                    }
                    debug!(refreshes, "401 received, refreshing token");
                    token = self.tokens.refresh().await?;
                }
                FaultClass::Throttled | FaultClass::ServerError => {
                    refreshes = 0;
                    if attempts >= self.policy.max_attempts {
                        warn!(attempts, status = response.status, "Retry ceiling reached");
                        return Err(PanoptoError::RetriesExhausted {
                            attempts,
                            last_status: response.status,
                        });
                    }
                    let delay = self.backoff.delay(class, attempts);
                    warn!(
                        status = response.status,
                        attempt = attempts,
                        delay_secs = delay.as_secs(),
                        "Transient destination fault, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpMethod;
    use bridge_traits::time::SystemClock;
    use core_auth::error::Result as AuthResult;
    use mockall::mock;
    use mockall::Sequence;
    use std::sync::Mutex;
    use std::time::Duration;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    mock! {
        Tokens {}

        #[async_trait]
        impl TokenProvider for Tokens {
            async fn access_token(&self) -> AuthResult<String>;
            async fn refresh(&self) -> AuthResult<String>;
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn fixed_tokens() -> MockTokens {
        let mut tokens = MockTokens::new();
        tokens
            .expect_access_token()
            .returning(|| Ok("token-1".to_string()));
        tokens
    }

    fn client(
        http: MockHttpClient,
        tokens: MockTokens,
        sleeper: Arc<RecordingSleeper>,
    ) -> TransientFaultClient {
        let limiter = Arc::new(RateLimiter::new(
            1000,
            Duration::from_secs(1),
            Arc::new(SystemClock),
            sleeper.clone(),
        ));
        TransientFaultClient::new(Arc::new(http), Arc::new(tokens), sleeper, limiter)
    }

    fn request() -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            "https://video.example.edu/Panopto/api/v1/sessions/s1",
        )
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .withf(|req| {
                req.headers.get("Authorization").map(String::as_str) == Some("Bearer token-1")
            })
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, fixed_tokens(), sleeper.clone());

        let response = client.call(request()).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_throttled_twice_then_success() {
        let mut http = MockHttpClient::new();
        let mut seq = Sequence::new();
        http.expect_execute()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(429, "slow down")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, fixed_tokens(), sleeper.clone());

        let response = client.call_limited(request()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_secs(10), Duration::from_secs(10)]
        );
    }

    #[tokio::test]
    async fn test_server_error_waits_longer() {
        let mut http = MockHttpClient::new();
        let mut seq = Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(500, "oops")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, fixed_tokens(), sleeper.clone());

        client.call(request()).await.unwrap();
        assert_eq!(*sleeper.sleeps.lock().unwrap(), vec![Duration::from_secs(50)]);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_and_retries_without_sleep() {
        let mut http = MockHttpClient::new();
        let mut seq = Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.headers.get("Authorization").map(String::as_str) == Some("Bearer token-1")
            })
            .returning(|_| Ok(HttpResponse::new(401, "")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.headers.get("Authorization").map(String::as_str) == Some("Bearer token-2")
            })
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let mut tokens = fixed_tokens();
        tokens
            .expect_refresh()
            .times(1)
            .returning(|| Ok("token-2".to_string()));

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, tokens, sleeper.clone());

        client.call(request()).await.unwrap();
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_status_fails_once() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(404, "no such session")));

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, fixed_tokens(), sleeper);

        match client.call(request()).await {
            Err(PanoptoError::ApiError {
                status_code,
                message,
            }) => {
                assert_eq!(status_code, 404);
                assert_eq!(message, "no such session");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ceiling_stops_endless_throttling() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(3)
            .returning(|_| Ok(HttpResponse::new(429, "")));

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, fixed_tokens(), sleeper.clone()).with_policy(RetryPolicy {
            max_attempts: 3,
            max_auth_refreshes: 5,
        });

        match client.call(request()).await {
            Err(PanoptoError::RetriesExhausted {
                attempts,
                last_status,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, 429);
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_persistent_unauthorized_hits_refresh_limit() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(3)
            .returning(|_| Ok(HttpResponse::new(401, "")));

        let mut tokens = fixed_tokens();
        tokens
            .expect_refresh()
            .times(2)
            .returning(|| Ok("token-n".to_string()));

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, tokens, sleeper).with_policy(RetryPolicy {
            max_attempts: 20,
            max_auth_refreshes: 2,
        });

        match client.call(request()).await {
            Err(PanoptoError::AuthRefreshLimit { refreshes }) => assert_eq!(refreshes, 2),
            other => panic!("expected AuthRefreshLimit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_limit_counts_only_consecutive_unauthorized() {
        // 401, 401, 500, 401, 401, 200 with a limit of two refreshes.
        let mut http = MockHttpClient::new();
        let mut seq = Sequence::new();
        for status in [401, 401, 500, 401, 401, 200] {
            http.expect_execute()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| Ok(HttpResponse::new(status, "")));
        }

        let mut tokens = fixed_tokens();
        tokens
            .expect_refresh()
            .times(4)
            .returning(|| Ok("token-n".to_string()));

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, tokens, sleeper.clone()).with_policy(RetryPolicy {
            max_attempts: 20,
            max_auth_refreshes: 2,
        });

        let response = client.call(request()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Err(BridgeError::Transport {
                url: "https://video.example.edu".to_string(),
                message: "connection reset".to_string(),
            })
        });

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(http, fixed_tokens(), sleeper);

        match client.call(request()).await {
            Err(PanoptoError::Bridge(inner)) => assert!(inner.is_transport()),
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
