//! Status classification and retry policy for destination calls.

use core_runtime::config::RetrySettings;
use std::time::Duration;

/// How a received status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// 2xx
    Success,
    /// 401: re-run token acquisition, retry at once
    Unauthorized,
    /// 429: back off, retry
    Throttled,
    /// 500: back off, retry
    ServerError,
    /// Anything else: fail this call
    Permanent,
}

impl FaultClass {
    pub fn classify(status: u16) -> Self {
        match status {
            200..=299 => FaultClass::Success,
            401 => FaultClass::Unauthorized,
            429 => FaultClass::Throttled,
            500 => FaultClass::ServerError,
            _ => FaultClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FaultClass::Unauthorized | FaultClass::Throttled | FaultClass::ServerError
        )
    }
}

/// Pluggable wait between attempts.
pub trait BackoffStrategy: Send + Sync {
    /// Delay before retrying after `class` on the given 1-based attempt.
    fn delay(&self, class: FaultClass, attempt: u32) -> Duration;
}

/// Fixed wait per fault class; 401 never waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    pub throttled: Duration,
    pub server_error: Duration,
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self {
            throttled: Duration::from_secs(10),
            server_error: Duration::from_secs(50),
        }
    }
}

impl BackoffStrategy for FixedBackoff {
    fn delay(&self, class: FaultClass, _attempt: u32) -> Duration {
        match class {
            FaultClass::Throttled => self.throttled,
            FaultClass::ServerError => self.server_error,
            _ => Duration::ZERO,
        }
    }
}

/// Ceiling on attempts for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// All fault classes count towards this
    pub max_attempts: u32,
    /// Consecutive 401s tolerated
    pub max_auth_refreshes: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            max_auth_refreshes: 5,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> (Self, FixedBackoff) {
        (
            Self {
                max_attempts: settings.max_attempts.max(1),
                max_auth_refreshes: settings.max_auth_refreshes,
            },
            FixedBackoff {
                throttled: Duration::from_secs(settings.throttle_backoff_secs),
                server_error: Duration::from_secs(settings.server_error_backoff_secs),
            },
        )
    }
}
