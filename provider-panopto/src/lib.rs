//! # Panopto Provider
//!
//! Destination video platform client.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`TransientFaultClient`]: every destination call goes through it. It
//!   refreshes the bearer token on 401, backs off on 429 and 500, fails fast
//!   on any other non-2xx, and enforces a hard attempt ceiling.
//! - [`RateLimiter`]: sliding-window call limiter shared by all search-style
//!   endpoints (5 calls per second by default).
//! - [`PanoptoConnector`]: the REST surface (folder search, session search,
//!   folder listing, rename, delete) implementing
//!   [`DestinationPlatform`](bridge_traits::media::DestinationPlatform).

pub mod client;
pub mod connector;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod types;

pub use client::TransientFaultClient;
pub use connector::PanoptoConnector;
pub use error::{PanoptoError, Result};
pub use rate_limit::RateLimiter;
pub use retry::{BackoffStrategy, FaultClass, FixedBackoff, RetryPolicy};
