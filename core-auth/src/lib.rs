//! # Authentication Module
//!
//! Bearer credentials for the two remote platforms.
//!
//! ## Overview
//!
//! - The destination video platform is accessed with an OAuth 2.0 resource
//!   owner password grant. [`PasswordGrantTokenProvider`] acquires a token on
//!   first use and re-runs the grant whenever the caller asks for a refresh,
//!   which is what the destination client does on every 401.
//! - The source recording platform issues session tokens for a signed
//!   JWT-bearer assertion ([`JwtBearerTokenProvider`]). A token obtained out of
//!   band can be wrapped in a [`StaticTokenProvider`] instead.
//!
//! Both sit behind the [`TokenProvider`] trait so provider crates never know
//! which flow produced the token.

pub mod error;
pub mod jwt_bearer;
pub mod provider;
pub mod types;

pub use error::{AuthError, Result};
pub use jwt_bearer::{JwtBearerCredentials, JwtBearerTokenProvider};
pub use provider::{PasswordGrantTokenProvider, StaticTokenProvider, TokenProvider};
pub use types::{AccessToken, ResourceOwnerCredentials};
