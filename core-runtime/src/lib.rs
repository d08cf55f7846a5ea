//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the recording migration workspace:
//! - Logging and tracing infrastructure
//! - Configuration management (builder and TOML)
//! - Event bus system
//!
//! ## Overview
//!
//! Every other crate depends on this one for its configuration types and its
//! logging conventions. Nothing here talks to the network.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::MigrationConfig;
pub use error::{Error, Result};
