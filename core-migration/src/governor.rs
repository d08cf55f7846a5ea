//! Wall-clock cutoff for scheduled runs.

use bridge_traits::time::Clock;
use chrono::NaiveTime;
use core_runtime::config::ScheduleSettings;
use std::sync::Arc;
use tracing::info;

/// Trips once the time of day passes the configured stop time.
///
/// Consulted between units of work only; an in-flight call always finishes.
/// Manual runs never stop.
#[derive(Clone)]
pub struct TimeBudgetGovernor {
    clock: Arc<dyn Clock>,
    scheduled_run: bool,
    stop_time: NaiveTime,
}

impl TimeBudgetGovernor {
    pub fn new(clock: Arc<dyn Clock>, schedule: &ScheduleSettings) -> Self {
        Self {
            clock,
            scheduled_run: schedule.scheduled_run,
            stop_time: schedule.controlled_stop_time,
        }
    }

    /// A governor that never trips.
    pub fn unlimited(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            scheduled_run: false,
            stop_time: NaiveTime::MIN,
        }
    }

    pub fn stop_time(&self) -> NaiveTime {
        self.stop_time
    }

    pub fn should_stop(&self) -> bool {
        if !self.scheduled_run {
            return false;
        }
        let now = self.clock.time_of_day();
        let stop = now >= self.stop_time;
        if stop {
            info!(now = %now, stop_time = %self.stop_time, "Controlled stop time reached");
        }
        stop
    }

    pub fn now_label(&self) -> String {
        self.clock.time_of_day().format("%H:%M:%S").to_string()
    }
}
