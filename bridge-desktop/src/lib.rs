//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for the desktop migration runner
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (one attempt per call, statuses passed through)
//! - `FileSystemAccess` using `tokio::fs`
//! - `Sleeper` using `tokio::time::sleep`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem, TokioSleeper};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let fs = Arc::new(TokioFileSystem::new());
//!     let sleeper = Arc::new(TokioSleeper);
//!
//!     // Hand to the migration service dependencies
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;
mod sleeper;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use sleeper::TokioSleeper;
