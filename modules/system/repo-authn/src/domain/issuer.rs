//! Minting of internal tokens signed with the local secret.

use repo_security::{ScopedPermission, TokenVariant};
use serde::Serialize;
use time::OffsetDateTime;

use super::claims::{self, ClaimValue, Claims};
use super::error::AuthError;
use super::parser::{
    EMAIL, FIRSTNAME, GROUP_ID, GROUPS, LASTNAME, PERMISSIONS, PRINCIPAL_NAME, ROLES,
    SERVICE_NAME, SOURCES, TOKEN_TYPE, USERNAME,
};

/// Builder for user, service and temporary tokens.
///
/// ```ignore
/// let token = TokenBuilder::service("indexer")
///     .roles(["ROLE_SERVICE_WRITE"])
///     .sources(["indexer.internal"])
///     .compact(secret, OffsetDateTime::now_utc() + Duration::minutes(5))?;
/// ```
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    variant: TokenVariant,
    claims: Claims,
    error: Option<AuthError>,
}

impl TokenBuilder {
    fn new(variant: TokenVariant) -> Self {
        let mut claims = Claims::new();
        claims.insert(TOKEN_TYPE, variant.claim_value());
        Self {
            variant,
            claims,
            error: None,
        }
    }

    #[must_use]
    pub fn user(username: impl Into<String>) -> Self {
        Self::new(TokenVariant::User).simple_claim(USERNAME, username.into())
    }

    #[must_use]
    pub fn service(service_name: impl Into<String>) -> Self {
        Self::new(TokenVariant::Service).simple_claim(SERVICE_NAME, service_name.into())
    }

    #[must_use]
    pub fn temporary(principal_name: impl Into<String>) -> Self {
        Self::new(TokenVariant::Temporary).simple_claim(PRINCIPAL_NAME, principal_name.into())
    }

    #[must_use]
    pub fn variant(&self) -> TokenVariant {
        self.variant
    }

    #[must_use]
    pub fn firstname(self, firstname: impl Into<String>) -> Self {
        self.simple_claim(FIRSTNAME, firstname.into())
    }

    #[must_use]
    pub fn lastname(self, lastname: impl Into<String>) -> Self {
        self.simple_claim(LASTNAME, lastname.into())
    }

    #[must_use]
    pub fn email(self, email: impl Into<String>) -> Self {
        self.simple_claim(EMAIL, email.into())
    }

    #[must_use]
    pub fn group_id(self, group_id: impl Into<String>) -> Self {
        self.simple_claim(GROUP_ID, group_id.into())
    }

    #[must_use]
    pub fn groups<I, S>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.object_claim(GROUPS, &collect(groups))
    }

    #[must_use]
    pub fn roles<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.object_claim(ROLES, &collect(roles))
    }

    #[must_use]
    pub fn sources<I, S>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.object_claim(SOURCES, &collect(sources))
    }

    #[must_use]
    pub fn scoped_permissions(self, permissions: &[ScopedPermission]) -> Self {
        self.object_claim(PERMISSIONS, permissions)
    }

    /// Sets a claim carried as a plain wire value.
    #[must_use]
    pub fn simple_claim(mut self, name: &str, value: impl Into<ClaimValue>) -> Self {
        self.claims.insert(name, value);
        self
    }

    /// Sets a claim carried as a JSON-encoded string.
    #[must_use]
    pub fn object_claim<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Self {
        if self.error.is_none()
            && let Err(e) = self.claims.insert_object(name, value)
        {
            self.error = Some(e);
        }
        self
    }

    /// The claim map as built so far.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Signs the token with HMAC-SHA256 over `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] when a claim could not be serialized or signing fails.
    pub fn compact(self, secret: &[u8], expires_at: OffsetDateTime) -> Result<String, AuthError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        claims::encode(&self.claims, secret, Some(expires_at))
    }
}

fn collect<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
