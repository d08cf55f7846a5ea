//! Suspension points backed by the Tokio timer.

use async_trait::async_trait;
use bridge_traits::time::Sleeper;
use std::time::Duration;
use tracing::trace;

/// `Sleeper` that parks the current task on `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        trace!(duration_ms = duration.as_millis() as u64, "Suspending");
        tokio::time::sleep(duration).await;
    }
}
