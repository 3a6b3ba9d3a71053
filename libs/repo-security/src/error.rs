//! Errors raised while constructing the token model.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// A temporary token must carry at least one scoped permission.
    #[error("temporary token grants no permissions")]
    NoPermissionsGranted,

    /// A claim required to build the principal is missing or has the wrong shape.
    #[error("invalid authentication: {0}")]
    InvalidAuthentication(String),
}
