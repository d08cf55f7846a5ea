//! # Migration Engine
//!
//! Moves staged recordings from the source platform to the destination and
//! reconciles whatever the destination has not caught up with yet.
//!
//! ## Overview
//!
//! A staged file's identity lives in its name (`{label}#{id}#{title}.mp4`),
//! so every step can be repeated after a crash: a later run's duplicate
//! check finds objects left behind and finishes them.
//!
//! ## Components
//!
//! - **Naming** (`naming`): file name composition, parsing and canonical names
//! - **Presence Matcher** (`matcher`): which staged files a folder already holds
//! - **Folder Resolver** (`resolver`): course to destination folder, memoised in a JSON document
//! - **Lifecycle** (`lifecycle`): validated per-file state transitions
//! - **Upload Orchestrator** (`orchestrator`): duplicate check, upload, discovery, rename, cleanup
//! - **Sweep Engine** (`sweep`): bounded re-discover / re-delete rounds and crash mitigation
//! - **Time Budget Governor** (`governor`): controlled stop for scheduled runs
//! - **Runner** (`runner`): one full run over the eligible courses
//! - **Report** (`report`): end-of-run summary and the [`Notifier`] seam

pub mod error;
pub mod finalize;
pub mod governor;
pub mod lifecycle;
pub mod matcher;
pub mod naming;
pub mod orchestrator;
pub mod outcome;
pub mod report;
pub mod resolver;
pub mod runner;
pub mod source;
pub mod sweep;

pub use error::{is_recoverable, MigrationError, Result};
pub use finalize::{Finalized, RecordingFinalizer};
pub use governor::TimeBudgetGovernor;
pub use lifecycle::{LifecycleState, RecordingLifecycle};
pub use matcher::{CheckMode, MatchOutcome, PresenceMatcher, PresentObject, UndiscoveredFolders};
pub use naming::{canonical_name, clean_name, compose_file_name, StagedFile};
pub use orchestrator::{OrchestratorSettings, UploadOrchestrator};
pub use outcome::{RunContext, RunOutcome};
pub use report::{LogNotifier, Notifier, RunReport};
pub use resolver::{
    FolderMapping, FolderMappingStore, FolderResolver, JsonFileMappingStore, Resolution,
    ResolutionStep, ResolverOutput,
};
pub use runner::{MigrationRunner, Platforms};
pub use source::{
    attach_created_at, group_by_container, Course, CourseSource, DateRange, DownloadsDirectory,
    InlineCourseSource, RecordingStager, StagingResult,
};
pub use sweep::{SweepEngine, SweepResult, SweepSettings};
