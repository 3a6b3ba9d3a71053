//! Validation failures.

use http::StatusCode;
use repo_security::TokenError;
use thiserror::Error;

use super::verifier::KeySetError;

/// Every way a presented token can be rejected.
///
/// All variants are terminal for the request: no partial authentication is installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// An `Authorization` header was present but carried no bearer credential.
    #[error("missing bearer credentials")]
    MissingCredentials,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("token expired")]
    ExpiredToken,

    #[error("bad signature")]
    BadSignature,

    /// Remote path only: `aud` is absent or does not name this resource.
    #[error("invalid audience")]
    InvalidAudience,

    #[error("temporary token grants no permissions")]
    NoPermissionsGranted,

    #[error("unauthorized origin '{remote}'")]
    UnauthorizedOrigin { remote: String },

    /// A claim could not be parsed into the type the variant declares for it.
    #[error("invalid authentication: {0}")]
    InvalidAuthentication(String),

    /// The remote key set could not be fetched or parsed.
    #[error("remote key set unavailable: {0}")]
    KeySetUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status the surrounding web layer should answer with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::KeySetUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Human-readable reason safe to return to the caller.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "Missing or invalid Authorization header",
            Self::MalformedToken(_) => "Malformed token",
            Self::ExpiredToken => "Token has expired",
            Self::BadSignature => "Token signature could not be verified",
            Self::InvalidAudience => "Token was not issued for this service",
            Self::NoPermissionsGranted => "Temporary token grants no permissions",
            Self::UnauthorizedOrigin { .. } => "Token is not valid from this origin",
            Self::InvalidAuthentication(_) => "Token claims are invalid",
            Self::KeySetUnavailable(_) => "Authentication service unavailable",
            Self::Internal(_) => "Internal authentication error",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::NoPermissionsGranted => Self::NoPermissionsGranted,
            TokenError::InvalidAuthentication(msg) => Self::InvalidAuthentication(msg),
        }
    }
}

impl From<KeySetError> for AuthError {
    fn from(e: KeySetError) -> Self {
        Self::KeySetUnavailable(e.to_string())
    }
}
