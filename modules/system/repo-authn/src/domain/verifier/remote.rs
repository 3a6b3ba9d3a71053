use std::sync::Arc;

use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use serde_json::Value;

use super::key_set::{CachedKeySet, KeySetCache};
use super::{SignatureVerifier, TrustPath, verify_signature};
use crate::domain::claims::UnverifiedToken;
use crate::domain::error::AuthError;

const AUDIENCE: &str = "aud";

/// Asymmetric signatures checked against the issuer's published key set.
///
/// Besides the signature, the token must name `audience` in its `aud` claim.
pub struct RemoteKeySetVerifier {
    keys: KeySetCache,
    audience: String,
}

impl RemoteKeySetVerifier {
    #[must_use]
    pub fn new(keys: KeySetCache, audience: impl Into<String>) -> Self {
        Self {
            keys,
            audience: audience.into(),
        }
    }

    #[must_use]
    pub fn key_set(&self) -> &KeySetCache {
        &self.keys
    }

    fn decoding_key(&self, header: &Header) -> Result<DecodingKey, AuthError> {
        let set = self.keys.current()?;
        if let Some(jwk) = select_key(&set, header) {
            return to_decoding_key(jwk);
        }

        // An unknown kid may mean the issuer rotated keys since the last fetch.
        if header.kid.is_some()
            && let Some(refreshed) = self.keys.refresh_after_miss(&set)?
            && let Some(jwk) = select_key(&refreshed, header)
        {
            return to_decoding_key(jwk);
        }

        tracing::debug!(kid = ?header.kid, alg = ?header.alg, "no matching key in remote key set");
        Err(AuthError::BadSignature)
    }

    fn check_audience(&self, token: &UnverifiedToken<'_>) -> Result<(), AuthError> {
        let matches = match token.payload().get(AUDIENCE) {
            Some(Value::String(aud)) => *aud == self.audience,
            Some(Value::Array(auds)) => auds
                .iter()
                .any(|a| a.as_str() == Some(self.audience.as_str())),
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(AuthError::InvalidAudience)
        }
    }
}

impl SignatureVerifier for RemoteKeySetVerifier {
    fn accepts(&self, header: &Header) -> bool {
        is_asymmetric(header.alg)
    }

    fn verify(&self, token: &UnverifiedToken<'_>) -> Result<TrustPath, AuthError> {
        let header = token.header();
        if !self.accepts(header) {
            return Err(AuthError::BadSignature);
        }
        let key = self.decoding_key(header)?;
        verify_signature(token.raw(), &key, header.alg)?;
        self.check_audience(token)?;
        Ok(TrustPath::RemoteKeySet)
    }
}

const fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// By `kid` when the header has one, otherwise the single key usable with the header algorithm.
fn select_key<'a>(set: &'a Arc<CachedKeySet>, header: &Header) -> Option<&'a Jwk> {
    let keys = set.keys();
    if let Some(kid) = header.kid.as_deref() {
        return keys.find(kid).filter(|jwk| algorithm_compatible(jwk, header.alg));
    }

    let mut candidates = keys
        .keys
        .iter()
        .filter(|jwk| algorithm_compatible(jwk, header.alg));
    match (candidates.next(), candidates.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// A key without a declared algorithm is usable with any; otherwise names must agree.
fn algorithm_compatible(jwk: &Jwk, alg: Algorithm) -> bool {
    let Some(declared) = jwk.common.key_algorithm.as_ref() else {
        return true;
    };
    match (serde_json::to_value(declared), serde_json::to_value(alg)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    DecodingKey::from_jwk(jwk).map_err(|e| {
        tracing::debug!(error = %e, "unusable key in remote key set");
        AuthError::BadSignature
    })
}
