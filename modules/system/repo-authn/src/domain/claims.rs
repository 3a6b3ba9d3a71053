//! Claim codec: flat claim maps to and from compact signed tokens.
//!
//! The wire format only carries string, number and boolean claim values. Lists and
//! nested records are JSON-encoded into a single string claim; this applies both when
//! encoding and when decoding tokens minted elsewhere.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use time::OffsetDateTime;

use super::error::AuthError;
use super::verifier::{SignatureVerifier, TrustPath};

/// Registered expiry claim. Reserved: it travels outside [`Claims`], as the `expires_at`
/// argument of [`encode`] and the `expires_at` field of [`DecodedToken`].
pub const EXPIRES_AT: &str = "exp";

/// A single wire-level claim value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Bool(bool),
    Number(Number),
    String(String),
}

impl ClaimValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Bool(_) | Self::Number(_) => None,
        }
    }

    /// Short type name used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }

    /// Flattens a JSON value onto the wire model. `null` has no wire form.
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => Some(Self::Number(n)),
            Value::String(s) => Some(Self::String(s)),
            complex @ (Value::Array(_) | Value::Object(_)) => Some(Self::String(complex.to_string())),
        }
    }

    fn into_json(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(n),
            Self::String(s) => Value::String(s),
        }
    }
}

impl From<String> for ClaimValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ClaimValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<bool> for ClaimValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ClaimValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// Flat, string-keyed claim map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims(BTreeMap<String, ClaimValue>);

impl Claims {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ClaimValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Inserts an arbitrary JSON value, encoding lists and records as a JSON string.
    /// A `null` value removes the claim.
    pub fn insert_json(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match ClaimValue::from_json(value) {
            Some(v) => {
                self.0.insert(name, v);
            }
            None => {
                self.0.remove(&name);
            }
        }
    }

    /// Serializes `value` and inserts it like [`Claims::insert_json`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] when `value` cannot be serialized.
    pub fn insert_object<T: Serialize + ?Sized>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<(), AuthError> {
        let json = serde_json::to_value(value)
            .map_err(|e| AuthError::Internal(format!("claim serialization failed: {e}")))?;
        self.insert_json(name, json);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ClaimValue::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<ClaimValue> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_payload(self) -> Map<String, Value> {
        self.0
            .into_iter()
            .map(|(k, v)| (k, v.into_json()))
            .collect()
    }

    fn from_payload(payload: Map<String, Value>) -> Self {
        Self(
            payload
                .into_iter()
                .filter_map(|(k, v)| ClaimValue::from_json(v).map(|v| (k, v)))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<ClaimValue>> FromIterator<(K, V)> for Claims {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A token whose structure parsed but whose signature is not yet verified.
#[derive(Debug)]
pub struct UnverifiedToken<'a> {
    raw: &'a str,
    header: Header,
    payload: Map<String, Value>,
}

impl UnverifiedToken<'_> {
    #[must_use]
    pub fn raw(&self) -> &str {
        self.raw
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Raw payload. Nothing in it may be trusted before the signature is verified.
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

/// Result of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    /// Verified claims without the expiry.
    pub claims: Claims,
    pub expires_at: Option<OffsetDateTime>,
    pub trust: TrustPath,
}

/// Signs `claims` with HMAC-SHA256 over `secret`, adding `exp` when `expires_at` is set.
///
/// # Errors
///
/// Returns [`AuthError::Internal`] when `claims` carries the reserved `exp` or signing fails.
pub fn encode(
    claims: &Claims,
    secret: &[u8],
    expires_at: Option<OffsetDateTime>,
) -> Result<String, AuthError> {
    encode_with(
        claims,
        &Header::new(Algorithm::HS256),
        &EncodingKey::from_secret(secret),
        expires_at,
    )
}

/// Signs `claims` with an arbitrary header and key.
///
/// # Errors
///
/// Returns [`AuthError::Internal`] when `claims` carries the reserved `exp` or signing fails.
pub fn encode_with(
    claims: &Claims,
    header: &Header,
    key: &EncodingKey,
    expires_at: Option<OffsetDateTime>,
) -> Result<String, AuthError> {
    if claims.contains(EXPIRES_AT) {
        return Err(AuthError::Internal(
            "exp is reserved, pass the expiry separately".to_owned(),
        ));
    }
    let mut payload = claims.clone().into_payload();
    if let Some(exp) = expires_at {
        payload.insert(EXPIRES_AT.to_owned(), Value::from(exp.unix_timestamp()));
    }
    jsonwebtoken::encode(header, &payload, key)
        .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))
}

/// Decodes and verifies `token` against the current time.
///
/// # Errors
///
/// See [`decode_at`].
pub fn decode(token: &str, verifier: &dyn SignatureVerifier) -> Result<DecodedToken, AuthError> {
    decode_at(token, verifier, OffsetDateTime::now_utc())
}

/// Decodes and verifies `token` as of `now`.
///
/// Checks run in a fixed order: structure, expiry, signature. An expired token is reported
/// as expired whatever its signature.
///
/// # Errors
///
/// - [`AuthError::MalformedToken`] if the structure cannot be parsed
/// - [`AuthError::ExpiredToken`] if `now >= exp`
/// - whatever `verifier` reports, typically [`AuthError::BadSignature`]
pub fn decode_at(
    token: &str,
    verifier: &dyn SignatureVerifier,
    now: OffsetDateTime,
) -> Result<DecodedToken, AuthError> {
    let mut unverified = parse_unverified(token)?;

    let expires_at = read_expiry(&unverified.payload)?;
    if let Some(exp) = expires_at
        && now >= exp
    {
        return Err(AuthError::ExpiredToken);
    }

    let trust = verifier.verify(&unverified)?;

    unverified.payload.remove(EXPIRES_AT);
    Ok(DecodedToken {
        claims: Claims::from_payload(unverified.payload),
        expires_at,
        trust,
    })
}

/// Splits a compact token and parses its header and payload without verifying anything.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] when the token is not a three-part compact JWT
/// with a JSON object payload.
pub fn parse_unverified(token: &str) -> Result<UnverifiedToken<'_>, AuthError> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken(
            "expected three dot-separated segments".to_owned(),
        ));
    };
    if signature.is_empty() {
        return Err(AuthError::MalformedToken("token is unsigned".to_owned()));
    }

    let header = jsonwebtoken::decode_header(token)
        .map_err(|e| AuthError::MalformedToken(format!("header: {e}")))?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::MalformedToken(format!("payload encoding: {e}")))?;
    let payload: Map<String, Value> = serde_json::from_slice(&payload)
        .map_err(|e| AuthError::MalformedToken(format!("payload: {e}")))?;

    Ok(UnverifiedToken {
        raw: token,
        header,
        payload,
    })
}

fn read_expiry(payload: &Map<String, Value>) -> Result<Option<OffsetDateTime>, AuthError> {
    let Some(exp) = payload.get(EXPIRES_AT) else {
        return Ok(None);
    };
    let seconds = exp
        .as_i64()
        .ok_or_else(|| AuthError::MalformedToken("exp must be an integer".to_owned()))?;
    OffsetDateTime::from_unix_timestamp(seconds)
        .map(Some)
        .map_err(|e| AuthError::MalformedToken(format!("exp out of range: {e}")))
}
