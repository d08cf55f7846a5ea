//! # Host Bridge Traits
//!
//! Platform abstraction traits the migration engine depends on.
//!
//! ## Overview
//!
//! This crate defines the contract between the migration core and the
//! host-specific implementations. Each trait represents a capability the core
//! requires but that is provided differently per host (desktop runner, test
//! harness).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP operations
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Staging directory and mapping document I/O
//!
//! ### Remote Media Platforms
//! - [`DestinationPlatform`](media::DestinationPlatform) - Folder and session operations on the destination
//! - [`MediaUploader`](media::MediaUploader) - Byte-level upload transport into a destination folder
//! - [`SourcePlatform`](media::SourcePlatform) - Recording deletion on the source
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`Sleeper`](time::Sleeper) - Suspension points for backoff and consistency waits
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should convert host errors to `BridgeError` and include context such as the
//! file path or the URL involved.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared behind `Arc`
//! across async tasks.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod media;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use media::{
    DestinationFolder, DestinationObject, DestinationPlatform, MediaUploader, SourcePlatform,
    UploadStatus,
};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, Sleeper, SystemClock};
