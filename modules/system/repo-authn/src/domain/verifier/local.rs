use jsonwebtoken::{Algorithm, DecodingKey, Header};

use super::{SignatureVerifier, TrustPath, verify_signature};
use crate::domain::claims::UnverifiedToken;
use crate::domain::error::AuthError;

/// HMAC-SHA256 with a single shared secret.
pub struct LocalSecretVerifier {
    key: DecodingKey,
}

impl LocalSecretVerifier {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
        }
    }
}

impl std::fmt::Debug for LocalSecretVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSecretVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier for LocalSecretVerifier {
    fn accepts(&self, header: &Header) -> bool {
        header.alg == Algorithm::HS256
    }

    fn verify(&self, token: &UnverifiedToken<'_>) -> Result<TrustPath, AuthError> {
        if !self.accepts(token.header()) {
            return Err(AuthError::BadSignature);
        }
        verify_signature(token.raw(), &self.key, Algorithm::HS256)?;
        Ok(TrustPath::LocalSecret)
    }
}
