//! Validated token model.
//!
//! A [`Token`] is the typed result of parsing verified claims. Its variant is fixed by the
//! [`Principal`] it wraps and cannot change after construction.

use std::collections::BTreeSet;
use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::TokenError;
use crate::permission::ScopedPermission;

/// Token variant discriminator, carried on the wire in the `tokenType` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenVariant {
    User,
    Service,
    Temporary,
}

impl TokenVariant {
    /// Wire value of the `tokenType` claim.
    #[must_use]
    pub const fn claim_value(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Service => "SERVICE",
            Self::Temporary => "TEMPORARY",
        }
    }

    /// Resolves the discriminator. Missing or unknown values fall back to `User`,
    /// the least privileged variant.
    #[must_use]
    pub fn from_claim(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("SERVICE") => Self::Service,
            Some(v) if v.eq_ignore_ascii_case("TEMPORARY") => Self::Temporary,
            _ => Self::User,
        }
    }
}

impl fmt::Display for TokenVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.claim_value())
    }
}

/// Interactive user. None of the attributes are mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPrincipal {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
}

/// Machine-to-machine service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePrincipal {
    /// Allowed network origins. `None` means the token is not origin-restricted;
    /// an empty list admits no origin at all.
    pub sources: Option<Vec<String>>,
}

impl ServicePrincipal {
    /// Whether an origin allow-list is attached, empty or not.
    #[must_use]
    pub fn is_origin_restricted(&self) -> bool {
        self.sources.is_some()
    }
}

/// Temporary grant limited to a list of resource-scoped permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryPrincipal {
    scoped_permissions: Vec<ScopedPermission>,
}

impl TemporaryPrincipal {
    /// # Errors
    ///
    /// Returns [`TokenError::NoPermissionsGranted`] when `scoped_permissions` is empty.
    pub fn new(scoped_permissions: Vec<ScopedPermission>) -> Result<Self, TokenError> {
        if scoped_permissions.is_empty() {
            return Err(TokenError::NoPermissionsGranted);
        }
        Ok(Self { scoped_permissions })
    }

    #[must_use]
    pub fn scoped_permissions(&self) -> &[ScopedPermission] {
        &self.scoped_permissions
    }
}

/// Variant-specific part of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User(UserPrincipal),
    Service(ServicePrincipal),
    Temporary(TemporaryPrincipal),
}

impl Principal {
    #[must_use]
    pub const fn variant(&self) -> TokenVariant {
        match self {
            Self::User(_) => TokenVariant::User,
            Self::Service(_) => TokenVariant::Service,
            Self::Temporary(_) => TokenVariant::Temporary,
        }
    }
}

/// Attributes shared by every variant.
#[derive(Debug, Clone)]
pub struct TokenParts {
    /// The compact signed token the claims came from.
    pub raw_token: SecretString,
    pub principal_name: String,
    pub group_id: Option<String>,
    pub groups: Vec<String>,
    pub authorities: BTreeSet<String>,
    pub expires_at: OffsetDateTime,
}

/// A validated token.
#[derive(Debug, Clone)]
pub struct Token {
    parts: TokenParts,
    principal: Principal,
}

impl Token {
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidAuthentication`] when the principal name is blank.
    pub fn new(parts: TokenParts, principal: Principal) -> Result<Self, TokenError> {
        if parts.principal_name.trim().is_empty() {
            return Err(TokenError::InvalidAuthentication(
                "principal name is missing".to_owned(),
            ));
        }
        Ok(Self { parts, principal })
    }

    #[must_use]
    pub const fn variant(&self) -> TokenVariant {
        self.principal.variant()
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn raw_token(&self) -> &SecretString {
        &self.parts.raw_token
    }

    #[must_use]
    pub fn principal_name(&self) -> &str {
        &self.parts.principal_name
    }

    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.parts.group_id.as_deref()
    }

    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.parts.groups
    }

    #[must_use]
    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.parts.authorities
    }

    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        self.parts.expires_at
    }

    /// A token is invalid at and after its expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.parts.expires_at
    }

    /// Scoped grants; empty for user and service tokens.
    #[must_use]
    pub fn scoped_permissions(&self) -> &[ScopedPermission] {
        match &self.principal {
            Principal::Temporary(t) => t.scoped_permissions(),
            Principal::User(_) | Principal::Service(_) => &[],
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::permission::Permission;
    use time::Duration;

    fn parts(name: &str) -> TokenParts {
        TokenParts {
            raw_token: SecretString::from("a.b.c".to_owned()),
            principal_name: name.to_owned(),
            group_id: None,
            groups: Vec::new(),
            authorities: BTreeSet::new(),
            expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
        }
    }

    #[test]
    fn missing_or_unknown_discriminator_defaults_to_user() {
        assert_eq!(TokenVariant::from_claim(None), TokenVariant::User);
        assert_eq!(TokenVariant::from_claim(Some("")), TokenVariant::User);
        assert_eq!(TokenVariant::from_claim(Some("ROBOT")), TokenVariant::User);
        assert_eq!(
            TokenVariant::from_claim(Some("service")),
            TokenVariant::Service
        );
        assert_eq!(
            TokenVariant::from_claim(Some("TEMPORARY")),
            TokenVariant::Temporary
        );
    }

    #[test]
    fn temporary_principal_requires_permissions() {
        assert_eq!(
            TemporaryPrincipal::new(Vec::new()),
            Err(TokenError::NoPermissionsGranted)
        );
        let ok = TemporaryPrincipal::new(vec![ScopedPermission::new(
            "DataResource",
            "7",
            Permission::Read,
        )])
        .unwrap();
        assert_eq!(ok.scoped_permissions().len(), 1);
    }

    #[test]
    fn variant_follows_principal() {
        let token = Token::new(
            parts("svc"),
            Principal::Service(ServicePrincipal::default()),
        )
        .unwrap();
        assert_eq!(token.variant(), TokenVariant::Service);
        assert!(token.scoped_permissions().is_empty());
        assert!(token.authorities().is_empty());
    }

    #[test]
    fn blank_principal_name_is_rejected() {
        let err = Token::new(parts("  "), Principal::User(UserPrincipal::default())).unwrap_err();
        assert!(matches!(err, TokenError::InvalidAuthentication(_)));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let token = Token::new(parts("alice"), Principal::User(UserPrincipal::default())).unwrap();
        let exp = token.expires_at();
        assert!(token.is_expired_at(exp));
        assert!(!token.is_expired_at(exp - Duration::seconds(1)));
    }

    #[test]
    fn present_source_list_restricts_even_when_empty() {
        assert!(!ServicePrincipal { sources: None }.is_origin_restricted());
        assert!(
            ServicePrincipal {
                sources: Some(Vec::new())
            }
            .is_origin_restricted()
        );
        assert!(
            ServicePrincipal {
                sources: Some(vec!["localhost".to_owned()])
            }
            .is_origin_restricted()
        );
    }
}
