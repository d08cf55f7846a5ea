//! # Collaborate Provider
//!
//! Source recording platform client.
//!
//! Only the operation the migration engine drives directly lives here:
//! deleting a recording once its copy is confirmed on the destination.
//! Listing and downloading recordings belong to the staging side.

pub mod connector;
pub mod error;

pub use connector::CollabConnector;
pub use error::{CollabError, Result};
