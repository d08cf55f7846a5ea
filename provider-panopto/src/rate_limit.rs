//! Sliding-window call limiter.

use bridge_traits::time::{Clock, Sleeper};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// At most `max_calls` acquisitions in any window of `period`.
///
/// The lock is held across the wait so concurrent callers queue in order and
/// the ceiling holds process-wide.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    max_calls: usize,
    period: Duration,
    recent: Mutex<VecDeque<i64>>,
}

impl RateLimiter {
    pub fn new(
        max_calls: u32,
        period: Duration,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            clock,
            sleeper,
            max_calls: max_calls.max(1) as usize,
            period,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a call is allowed, then record it.
    pub async fn acquire(&self) {
        let period_ms = self.period.as_millis() as i64;
        let mut recent = self.recent.lock().await;

        loop {
            let now = self.clock.unix_timestamp_millis();
            while let Some(&oldest) = recent.front() {
                if now - oldest >= period_ms {
                    recent.pop_front();
                } else {
                    break;
                }
            }

            if recent.len() < self.max_calls {
                recent.push_back(now);
                return;
            }

            let oldest = recent.front().copied().unwrap_or(now);
            let wait = Duration::from_millis((oldest + period_ms - now).max(1) as u64);
            debug!(wait_ms = wait.as_millis() as u64, "Rate limiting: waiting");
            self.sleeper.sleep(wait).await;
        }
    }
}
