//! Desktop wiring: Reqwest transport, Tokio filesystem and timer, and the
//! Panopto and Collaborate connectors.

use async_trait::async_trait;
use bridge_desktop::{ReqwestHttpClient, TokioFileSystem, TokioSleeper};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::HttpClient;
use bridge_traits::media::{MediaUploader, SourcePlatform};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::{Clock, Sleeper, SystemClock};
use core_auth::{
    JwtBearerCredentials, JwtBearerTokenProvider, PasswordGrantTokenProvider,
    ResourceOwnerCredentials,
};
use core_migration::{
    CourseSource, JsonFileMappingStore, Notifier, Platforms, RecordingStager,
};
use core_runtime::config::MigrationConfig;
use core_runtime::events::EventBus;
use provider_collab::CollabConnector;
use provider_panopto::{PanoptoConnector, RateLimiter, RetryPolicy, TransientFaultClient};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::service::MigrationService;

const EVENT_CAPACITY: usize = 256;

/// Stand-in when no source credentials are configured. Validation rejects
/// source deletion without credentials, so this is never asked to delete.
struct UnconfiguredSource;

#[async_trait]
impl SourcePlatform for UnconfiguredSource {
    async fn delete_recording(&self, recording_id: &str) -> BridgeResult<bool> {
        Err(BridgeError::NotAvailable(format!(
            "source platform not configured, cannot delete {}",
            recording_id
        )))
    }
}

/// Host-provided pieces: the upload transport, the course list and the
/// downloader stay outside the core.
pub struct HostAdapters {
    pub uploader: Arc<dyn MediaUploader>,
    pub courses: Arc<dyn CourseSource>,
    pub stager: Arc<dyn RecordingStager>,
    pub notifier: Arc<dyn Notifier>,
}

/// Build a ready-to-run service on top of the desktop bridges.
///
/// ```no_run
/// # async fn example(
/// #     config: core_runtime::MigrationConfig,
/// #     adapters: core_service::HostAdapters,
/// #     range: core_migration::DateRange,
/// # ) -> core_service::Result<()> {
/// let service = core_service::bootstrap_desktop(&config, adapters)?;
/// let report = service.run_supervised(&range).await?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
pub fn bootstrap_desktop(config: &MigrationConfig, adapters: HostAdapters) -> Result<MigrationService> {
    config.validate()?;

    let http: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::new().map_err(|e| CoreError::InitializationFailed(e.to_string()))?,
    );
    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let event_bus = EventBus::new(EVENT_CAPACITY);

    let destination_url = config.destination.base_url();
    let destination_tokens = PasswordGrantTokenProvider::new(
        ResourceOwnerCredentials::for_destination(
            &destination_url,
            config.destination.client_id.clone(),
            config.destination.client_secret.clone(),
            config.destination.username.clone(),
            config.destination.password.clone(),
        ),
        Arc::clone(&http),
        Arc::clone(&clock),
    )
    .with_event_bus(event_bus.clone());

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_calls,
        config.rate_limit.period(),
        Arc::clone(&clock),
        Arc::clone(&sleeper),
    ));
    let (policy, backoff) = RetryPolicy::from_settings(&config.retry);
    let client = TransientFaultClient::new(
        Arc::clone(&http),
        Arc::new(destination_tokens),
        Arc::clone(&sleeper),
        limiter,
    )
    .with_policy(policy)
    .with_backoff(Arc::new(backoff));
    let destination = Arc::new(PanoptoConnector::new(client, destination_url.clone()));

    let source: Arc<dyn SourcePlatform> = if config.source.is_configured() {
        let tokens = JwtBearerTokenProvider::new(
            JwtBearerCredentials::for_source(
                &config.source.base_url,
                config.source.key.clone(),
                config.source.secret.clone(),
            ),
            Arc::clone(&http),
            Arc::clone(&clock),
        );
        Arc::new(CollabConnector::new(
            Arc::clone(&http),
            Arc::new(tokens),
            config.source.base_url.clone(),
        ))
    } else {
        warn!("Source platform not configured; source recordings will be kept");
        Arc::new(UnconfiguredSource)
    };

    let mapping_store = Arc::new(JsonFileMappingStore::new(
        Arc::clone(&fs),
        config.folder_mapping_path(),
    ));

    info!(destination = %destination_url, "Desktop bridges initialised");

    let platforms = Platforms {
        destination,
        uploader: adapters.uploader,
        source,
        courses: adapters.courses,
        stager: adapters.stager,
        mapping_store,
        fs,
        clock,
        sleeper,
    };
    Ok(MigrationService::new(
        config,
        platforms,
        adapters.notifier,
        event_bus,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_source_is_not_available() {
        let err = UnconfiguredSource.delete_recording("r1").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }
}
