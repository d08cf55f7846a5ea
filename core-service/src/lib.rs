//! Service façade for the recording migration engine.
//!
//! [`MigrationService`] runs the engine once or under a supervisor that
//! restarts aborted runs after a cooldown. Desktop hosts enable the
//! `desktop-shims` feature (on by default) and call [`bootstrap_desktop`],
//! which wires `bridge-desktop` and the platform connectors. Other hosts
//! build [`core_migration::Platforms`] themselves and call
//! [`MigrationService::new`].

pub mod error;
pub mod service;

#[cfg(feature = "desktop-shims")]
pub mod bootstrap;

pub use error::{CoreError, Result};
pub use service::MigrationService;

#[cfg(feature = "desktop-shims")]
pub use bootstrap::{bootstrap_desktop, HostAdapters};
