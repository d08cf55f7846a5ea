//! # Event Bus System
//!
//! Typed run events published over `tokio::sync::broadcast`, so a notifier,
//! a progress display or a test can observe a migration run without the
//! engine knowing who is listening.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Orchestrator ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//! ┌──────────────┐     emit      │ (broadcast│                  └────────────┘
//! │ Sweep Engine ├──────────────>│  channel) │
//! └──────────────┘               └───────────┘
//! ```
//!
//! Emission is best-effort: publishing with no subscribers is not an error
//! for the engine, which ignores the `SendError`.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, RunEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Run(RunEvent::Started { run_id: "r-1".into() })).ok();
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.description(), "Run started");
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published and received through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Whole-run lifecycle
    Run(RunEvent),
    /// Per-course progress
    Course(CourseEvent),
    /// Per-recording lifecycle transitions
    Recording(RecordingEvent),
    /// Reconciliation sweep progress
    Sweep(SweepEvent),
    /// Destination credential events
    Auth(AuthEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Run(e) => e.description(),
            CoreEvent::Course(e) => e.description(),
            CoreEvent::Recording(e) => e.description(),
            CoreEvent::Sweep(e) => e.description(),
            CoreEvent::Auth(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Run(RunEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::RefreshFailed { .. }) => EventSeverity::Error,
            CoreEvent::Run(RunEvent::ControlledStop { .. })
            | CoreEvent::Recording(RecordingEvent::UploadFailed { .. })
            | CoreEvent::Recording(RecordingEvent::Undiscovered { .. })
            | CoreEvent::Recording(RecordingEvent::DeletionFailed { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Run(_) | CoreEvent::Course(CourseEvent::Completed { .. }) => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Run Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RunEvent {
    Started { run_id: String },
    /// The wall-clock cutoff tripped; no new work is started.
    ControlledStop { run_id: String, at: String },
    Completed {
        run_id: String,
        uploaded: usize,
        undiscovered: usize,
        failed_deletions: usize,
    },
    /// An unclassified error aborted the run.
    Failed { run_id: String, message: String },
    /// Supervisor is waiting before starting a fresh run.
    Restarting { attempt: u32, cooldown_secs: u64 },
}

impl RunEvent {
    fn description(&self) -> &str {
        match self {
            RunEvent::Started { .. } => "Run started",
            RunEvent::ControlledStop { .. } => "Run reached controlled stop",
            RunEvent::Completed { .. } => "Run completed",
            RunEvent::Failed { .. } => "Run failed",
            RunEvent::Restarting { .. } => "Run restarting after cooldown",
        }
    }
}

// ============================================================================
// Course Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CourseEvent {
    Started { label: String, staged: usize },
    FolderResolved { label: String, folder_id: String, fallback: bool },
    Completed { label: String, uploaded: usize, already_present: usize },
}

impl CourseEvent {
    fn description(&self) -> &str {
        match self {
            CourseEvent::Started { .. } => "Course processing started",
            CourseEvent::FolderResolved { .. } => "Course folder resolved",
            CourseEvent::Completed { .. } => "Course processing completed",
        }
    }
}

// ============================================================================
// Recording Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RecordingEvent {
    Uploaded { file_name: String },
    UploadFailed { file_name: String, reason: String },
    Discovered { file_name: String, session_id: String },
    Undiscovered { file_name: String },
    Renamed { session_id: String, name: String },
    SourceDeleted { recording_id: String },
    DeletionFailed { file_name: String },
}

impl RecordingEvent {
    fn description(&self) -> &str {
        match self {
            RecordingEvent::Uploaded { .. } => "Recording uploaded",
            RecordingEvent::UploadFailed { .. } => "Recording upload failed",
            RecordingEvent::Discovered { .. } => "Recording discovered on destination",
            RecordingEvent::Undiscovered { .. } => "Recording not yet visible on destination",
            RecordingEvent::Renamed { .. } => "Recording renamed",
            RecordingEvent::SourceDeleted { .. } => "Source recording deleted",
            RecordingEvent::DeletionFailed { .. } => "Destination deletion failed",
        }
    }
}

// ============================================================================
// Sweep Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SweepEvent {
    RediscoverRound { round: u32, pending: usize, resolved: usize },
    RedeleteRound { round: u32, pending: usize, resolved: usize },
    MitigationStarted { undiscovered: usize, failed_deletions: usize },
}

impl SweepEvent {
    fn description(&self) -> &str {
        match self {
            SweepEvent::RediscoverRound { .. } => "Re-discover round finished",
            SweepEvent::RedeleteRound { .. } => "Re-delete round finished",
            SweepEvent::MitigationStarted { .. } => "Crash mitigation started",
        }
    }
}

// ============================================================================
// Auth Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    TokenRefreshed { provider: String },
    RefreshFailed { provider: String, message: String },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::TokenRefreshed { .. } => "Access token refreshed",
            AuthEvent::RefreshFailed { .. } => "Access token refresh failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }

    /// Drains events without blocking; `None` once nothing is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => match &self.filter {
                    Some(filter) if !filter(&event) => continue,
                    _ => return Some(Ok(event)),
                },
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
