//! Run façade with notification and supervised restart.

use bridge_traits::time::Sleeper;
use core_migration::{DateRange, MigrationRunner, Notifier, Platforms, RunReport};
use core_runtime::config::MigrationConfig;
use core_runtime::events::{CoreEvent, EventBus, RunEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::Result;

/// Primary façade exposed to host applications.
pub struct MigrationService {
    runner: MigrationRunner,
    notifier: Arc<dyn Notifier>,
    sleeper: Arc<dyn Sleeper>,
    restart_cooldown: Duration,
    max_restarts: Option<u32>,
    event_bus: EventBus,
}

impl MigrationService {
    pub fn new(
        config: &MigrationConfig,
        platforms: Platforms,
        notifier: Arc<dyn Notifier>,
        event_bus: EventBus,
    ) -> Self {
        let sleeper = platforms.sleeper.clone();
        Self {
            runner: MigrationRunner::new(config, platforms, event_bus.clone()),
            notifier,
            sleeper,
            restart_cooldown: config.timing.restart_cooldown(),
            max_restarts: config.max_restarts,
            event_bus,
        }
    }

    /// Subscribe before running to observe progress.
    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn runner(&self) -> &MigrationRunner {
        &self.runner
    }

    /// Run once and notify the outcome. No restart.
    pub async fn run_once(&self, range: &DateRange) -> Result<RunReport> {
        match self.runner.run(range).await {
            Ok(report) => {
                self.notifier.notify_report(&report).await;
                Ok(report)
            }
            Err(e) => {
                self.notifier.notify_failure(&e.to_string()).await;
                Err(e.into())
            }
        }
    }

    /// Run until a run finishes, restarting after the cooldown whenever one
    /// aborts. Each attempt is a fresh run with its own pre-run reset; the
    /// aborted run has already been mitigated.
    ///
    /// # Errors
    ///
    /// The last run's error once `max_restarts` restarts have been used up.
    pub async fn run_supervised(&self, range: &DateRange) -> Result<RunReport> {
        let mut restarts = 0u32;
        loop {
            match self.runner.run(range).await {
                Ok(report) => {
                    info!(restarts, "Supervised run finished");
                    self.notifier.notify_report(&report).await;
                    return Ok(report);
                }
                Err(e) => {
                    error!(error = %e, restarts, "Run failed");
                    self.notifier.notify_failure(&e.to_string()).await;

                    if self.max_restarts.is_some_and(|max| restarts >= max) {
                        warn!(restarts, "Restart limit reached, giving up");
                        return Err(e.into());
                    }
                    restarts += 1;

                    warn!(
                        attempt = restarts,
                        cooldown_secs = self.restart_cooldown.as_secs(),
                        "Restarting after cooldown"
                    );
                    self.event_bus
                        .emit(CoreEvent::Run(RunEvent::Restarting {
                            attempt: restarts,
                            cooldown_secs: self.restart_cooldown.as_secs(),
                        }))
                        .ok();
                    self.sleeper.sleep(self.restart_cooldown).await;
                }
            }
        }
    }
}
