//! Recording migration workspace.
//!
//! Hosts depend on `recording-migration` and get the service façade from
//! `core-service` with the desktop bridges enabled. Individual crates
//! (`core-migration`, `provider-panopto`, ...) can be used directly when a
//! host brings its own platform wiring.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
