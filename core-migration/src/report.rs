//! End-of-run summary and the notification seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_runtime::events::EventSeverity;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Write};
use tracing::{error, info, warn};

use crate::naming::StagedFile;
use crate::outcome::RunOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub controlled_stop: bool,
    pub outcome: RunOutcome,
    /// Still undiscovered after the sweep
    pub final_undiscovered: Vec<StagedFile>,
    /// Still pending deletion after the sweep
    pub final_failed_deletions: Vec<StagedFile>,
    /// Course labels that fell back to the overflow folder
    pub missing_folders: Vec<String>,
}

impl RunReport {
    /// Warning when the run stopped early or left work for the next run.
    pub fn severity(&self) -> EventSeverity {
        if self.controlled_stop
            || !self.final_undiscovered.is_empty()
            || !self.final_failed_deletions.is_empty()
        {
            EventSeverity::Warning
        } else {
            EventSeverity::Info
        }
    }

    pub fn subject(&self) -> &'static str {
        if self.controlled_stop {
            "Recording migration: controlled stop"
        } else {
            "Recording migration: run complete"
        }
    }

    /// Plain-text summary with counts and lists.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if self.controlled_stop {
            out.push_str("--- CONTROLLED STOP ---\n");
        }
        out.push_str("--- END OF RUN SUMMARY ---\n");
        let _ = writeln!(out, "run: {}", self.run_id);
        let _ = writeln!(
            out,
            "duration: {}s",
            (self.finished_at - self.started_at).num_seconds()
        );
        let _ = writeln!(out, "successful uploads: {}", self.outcome.successful_uploads.len());

        let o = &self.outcome;
        section(&mut out, "failed downloads", &o.failed_downloads);
        section(
            &mut out,
            "failed uploads",
            &o.failed_uploads.iter().map(|p| p.display()).collect::<Vec<_>>(),
        );
        section(&mut out, "already on destination", &o.already_present);
        section(&mut out, "undiscovered uploads", &o.undiscovered_uploads);
        section(&mut out, "failed destination deletions", &o.failed_deletions);
        section(&mut out, "failed source deletions", &o.failed_source_deletions);
        section(&mut out, "missing folders", &self.missing_folders);
        section(&mut out, "undiscovered after sweep", &self.final_undiscovered);
        section(&mut out, "failed deletions after sweep", &self.final_failed_deletions);
        out
    }
}

fn section<T: Display>(out: &mut String, title: &str, items: &[T]) {
    let _ = writeln!(out, "{}: {}", title, items.len());
    for item in items {
        let _ = writeln!(out, "  - {}", item);
    }
}

/// Where run results go (an e-mail sender in production).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_report(&self, report: &RunReport);

    async fn notify_failure(&self, error_text: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_report(&self, report: &RunReport) {
        match report.severity() {
            EventSeverity::Warning | EventSeverity::Error => {
                warn!(subject = report.subject(), "{}", report.summary())
            }
            _ => info!(subject = report.subject(), "{}", report.summary()),
        }
    }

    async fn notify_failure(&self, error_text: &str) {
        error!(error = %error_text, "Recording migration run failed");
    }
}
