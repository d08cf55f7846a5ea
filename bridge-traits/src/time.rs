//! Time Abstractions
//!
//! Injectable time source and suspension points. Every wait the engine performs
//! (throttle backoff, processing lag, sweep settle time, restart cooldown) goes
//! through [`Sleeper`] so tests can observe the requested durations instead of
//! actually waiting.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveTime, Utc};
use std::time::Duration;

/// Time source trait
///
/// Abstracts system time to enable deterministic testing.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn past_cutoff(clock: &dyn Clock, cutoff: chrono::NaiveTime) -> bool {
///     clock.time_of_day() >= cutoff
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Get current Unix timestamp in seconds
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }

    /// Get current Unix timestamp in milliseconds
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// Wall-clock time of day in the host's local timezone.
    ///
    /// Batch-window cutoffs are expressed in local time, so this is what the
    /// run governor compares against.
    fn time_of_day(&self) -> NaiveTime {
        self.now().with_timezone(&Local).time()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Suspension point abstraction
///
/// Implementations must suspend the calling task (not busy-poll) for at least
/// the requested duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        calls: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.calls.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn test_system_clock() {
        let clock = SystemClock;
        let now = clock.now();
        let timestamp = clock.unix_timestamp();

        assert!(timestamp > 0);
        assert!(now.timestamp() <= timestamp);
    }

    #[test]
    fn test_millis_consistent_with_seconds() {
        let clock = FixedClock(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        assert_eq!(clock.unix_timestamp(), 1_700_000_000);
        assert_eq!(clock.unix_timestamp_millis(), 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_sleeper_object_safe() {
        let sleeper = RecordingSleeper::default();
        let dyn_sleeper: &dyn Sleeper = &sleeper;
        dyn_sleeper.sleep(Duration::from_secs(10)).await;
        dyn_sleeper.sleep(Duration::from_secs(50)).await;

        assert_eq!(
            *sleeper.calls.lock().unwrap(),
            vec![Duration::from_secs(10), Duration::from_secs(50)]
        );
    }
}
