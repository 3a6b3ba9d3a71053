//! Repository bearer token authentication.
//!
//! Turns an `Authorization` header and the caller's network address into a
//! [`repo_security::AuthorizationContext`]. Tokens are verified either with a local
//! HMAC secret or against the issuer's remote key set, then parsed into a user,
//! service or temporary principal.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

pub use config::{AuthConfig, ConfigError};
pub use domain::{AuthError, Authenticator, TokenBuilder};
