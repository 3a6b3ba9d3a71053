//! Signature trust paths.
//!
//! The local path verifies HMAC-SHA256 tokens with a shared secret. The remote path verifies
//! asymmetric signatures against a cached key set fetched from the issuer. The header algorithm
//! picks the path, so an HS256 token never reaches a public key and a mismatching signature never
//! falls through to the other strategy.

mod key_set;
mod local;
mod remote;

use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};
use serde_json::{Map, Value};

pub use key_set::{HttpKeySetSource, KeySetCache, KeySetError, KeySetSource};
pub use local::LocalSecretVerifier;
pub use remote::RemoteKeySetVerifier;

use super::claims::UnverifiedToken;
use super::error::AuthError;

/// Which strategy vouched for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPath {
    LocalSecret,
    RemoteKeySet,
}

/// A signature verification strategy.
pub trait SignatureVerifier: Send + Sync {
    /// Whether this strategy handles tokens with the given header.
    fn accepts(&self, header: &Header) -> bool;

    /// Verifies the signature of `token`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BadSignature`] on mismatch, or a strategy-specific error.
    fn verify(&self, token: &UnverifiedToken<'_>) -> Result<TrustPath, AuthError>;
}

/// Both trust paths behind one verifier. Either may be absent, not both.
pub struct TrustVerifier {
    local: Option<LocalSecretVerifier>,
    remote: Option<RemoteKeySetVerifier>,
}

impl TrustVerifier {
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] when neither strategy is supplied.
    pub fn new(
        local: Option<LocalSecretVerifier>,
        remote: Option<RemoteKeySetVerifier>,
    ) -> Result<Self, AuthError> {
        if local.is_none() && remote.is_none() {
            return Err(AuthError::Internal(
                "no trust path configured".to_owned(),
            ));
        }
        Ok(Self { local, remote })
    }

    #[must_use]
    pub fn local(&self) -> Option<&LocalSecretVerifier> {
        self.local.as_ref()
    }

    #[must_use]
    pub fn remote(&self) -> Option<&RemoteKeySetVerifier> {
        self.remote.as_ref()
    }
}

impl SignatureVerifier for TrustVerifier {
    fn accepts(&self, header: &Header) -> bool {
        self.local.as_ref().is_some_and(|l| l.accepts(header))
            || self.remote.as_ref().is_some_and(|r| r.accepts(header))
    }

    fn verify(&self, token: &UnverifiedToken<'_>) -> Result<TrustPath, AuthError> {
        if let Some(local) = self.local.as_ref().filter(|l| l.accepts(token.header())) {
            return local.verify(token);
        }
        if let Some(remote) = self.remote.as_ref().filter(|r| r.accepts(token.header())) {
            return remote.verify(token);
        }
        tracing::debug!(alg = ?token.header().alg, "no trust path accepts token algorithm");
        Err(AuthError::BadSignature)
    }
}

/// Checks only the signature of `raw` under `key`; claim validation happens elsewhere.
fn verify_signature(raw: &str, key: &DecodingKey, alg: Algorithm) -> Result<(), AuthError> {
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<Map<String, Value>>(raw, key, &validation)
        .map(|_| ())
        .map_err(|e| {
            tracing::debug!(error = %e, "signature verification failed");
            AuthError::BadSignature
        })
}
