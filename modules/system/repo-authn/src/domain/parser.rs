//! Token variant parser: verified claims to a typed [`Token`].

use std::collections::BTreeSet;

use repo_security::{
    Principal, ScopedPermission, ServicePrincipal, TemporaryPrincipal, Token, TokenParts,
    TokenVariant, UserPrincipal,
};
use secrecy::SecretString;
use serde::de::DeserializeOwned;

use super::claims::{ClaimValue, Claims, DecodedToken};
use super::error::AuthError;

pub const TOKEN_TYPE: &str = "tokenType";
pub const GROUP_ID: &str = "groupid";
pub const GROUPS: &str = "groups";
pub const ROLES: &str = "roles";
pub const USERNAME: &str = "username";
pub const PREFERRED_USERNAME: &str = "preferred_username";
pub const FIRSTNAME: &str = "firstname";
pub const LASTNAME: &str = "lastname";
pub const EMAIL: &str = "email";
pub const SERVICE_NAME: &str = "servicename";
pub const SOURCES: &str = "sources";
pub const PRINCIPAL_NAME: &str = "principalname";
pub const PERMISSIONS: &str = "permissions";
pub const SUBJECT: &str = "sub";

const REGISTERED: &[&str] = &["exp", "iat", "nbf", "iss", "aud", "sub", "jti"];

/// Target type of a supported claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    String,
    /// JSON-encoded array of strings.
    StringList,
    /// JSON-encoded array of scoped permission objects.
    ScopedPermissions,
}

const COMMON_CLAIMS: &[(&str, ClaimKind)] = &[
    (TOKEN_TYPE, ClaimKind::String),
    (GROUP_ID, ClaimKind::String),
    (GROUPS, ClaimKind::StringList),
    (ROLES, ClaimKind::StringList),
];

const USER_CLAIMS: &[(&str, ClaimKind)] = &[
    (USERNAME, ClaimKind::String),
    (PREFERRED_USERNAME, ClaimKind::String),
    (FIRSTNAME, ClaimKind::String),
    (LASTNAME, ClaimKind::String),
    (EMAIL, ClaimKind::String),
];

const SERVICE_CLAIMS: &[(&str, ClaimKind)] = &[
    (SERVICE_NAME, ClaimKind::String),
    (SOURCES, ClaimKind::StringList),
];

const TEMPORARY_CLAIMS: &[(&str, ClaimKind)] = &[
    (PRINCIPAL_NAME, ClaimKind::String),
    (PERMISSIONS, ClaimKind::ScopedPermissions),
];

/// Claims `variant` understands besides the registered ones.
pub fn supported_claims(variant: TokenVariant) -> impl Iterator<Item = (&'static str, ClaimKind)> {
    let specific = match variant {
        TokenVariant::User => USER_CLAIMS,
        TokenVariant::Service => SERVICE_CLAIMS,
        TokenVariant::Temporary => TEMPORARY_CLAIMS,
    };
    COMMON_CLAIMS.iter().chain(specific).copied()
}

fn is_supported(variant: TokenVariant, name: &str) -> bool {
    REGISTERED.contains(&name) || supported_claims(variant).any(|(n, _)| n == name)
}

/// Typed access to claim values.
struct ClaimReader<'a>(&'a Claims);

impl ClaimReader<'_> {
    fn string(&self, name: &str) -> Result<Option<String>, AuthError> {
        match self.0.get(name) {
            None => Ok(None),
            Some(ClaimValue::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(AuthError::InvalidAuthentication(format!(
                "claim '{name}' must be a string, found {}",
                other.kind()
            ))),
        }
    }

    fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AuthError> {
        let Some(raw) = self.string(name)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AuthError::InvalidAuthentication(format!("claim '{name}': {e}")))
    }

    fn string_list(&self, name: &str) -> Result<Option<Vec<String>>, AuthError> {
        self.json(name)
    }

    /// First present claim in `names`, in order.
    fn first_string(&self, names: &[&str]) -> Result<Option<String>, AuthError> {
        for name in names {
            if let Some(value) = self.string(name)?.filter(|v| !v.trim().is_empty()) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// Builds the typed token for `decoded`, the verified form of `raw`.
///
/// # Errors
///
/// - [`AuthError::MalformedToken`] when the token carries no expiry
/// - [`AuthError::InvalidAuthentication`] when a supported claim has the wrong shape or no
///   principal name can be resolved
/// - [`AuthError::NoPermissionsGranted`] for a temporary token without scoped permissions
pub fn parse_token(raw: &str, decoded: &DecodedToken) -> Result<Token, AuthError> {
    let claims = ClaimReader(&decoded.claims);
    let variant = TokenVariant::from_claim(decoded.claims.get_str(TOKEN_TYPE));

    for name in decoded.claims.names().filter(|n| !is_supported(variant, n)) {
        tracing::debug!(claim = name, %variant, "ignoring unsupported claim");
    }

    let expires_at = decoded
        .expires_at
        .ok_or_else(|| AuthError::MalformedToken("exp claim is missing".to_owned()))?;

    let name_claims: &[&str] = match variant {
        TokenVariant::User => &[USERNAME, PREFERRED_USERNAME, SUBJECT],
        TokenVariant::Service => &[SERVICE_NAME, SUBJECT],
        TokenVariant::Temporary => &[PRINCIPAL_NAME, SUBJECT],
    };
    let principal_name = claims.first_string(name_claims)?.ok_or_else(|| {
        AuthError::InvalidAuthentication(format!("{variant} token names no principal"))
    })?;

    let authorities: BTreeSet<String> = claims
        .string_list(ROLES)?
        .unwrap_or_default()
        .into_iter()
        .collect();

    let principal = match variant {
        TokenVariant::User => Principal::User(UserPrincipal {
            firstname: claims.string(FIRSTNAME)?,
            lastname: claims.string(LASTNAME)?,
            email: claims.string(EMAIL)?,
        }),
        TokenVariant::Service => {
            let sources = claims.string_list(SOURCES)?;
            if sources.is_none() {
                tracing::warn!(
                    service = %principal_name,
                    "service token carries no source restriction"
                );
            }
            Principal::Service(ServicePrincipal { sources })
        }
        TokenVariant::Temporary => {
            let grants: Vec<ScopedPermission> = claims.json(PERMISSIONS)?.unwrap_or_default();
            Principal::Temporary(TemporaryPrincipal::new(grants)?)
        }
    };

    let parts = TokenParts {
        raw_token: SecretString::from(raw.to_owned()),
        principal_name,
        group_id: claims.string(GROUP_ID)?,
        groups: claims.string_list(GROUPS)?.unwrap_or_default(),
        authorities,
        expires_at,
    };
    Ok(Token::new(parts, principal)?)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use repo_security::Permission;
    use serde_json::json;
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::domain::verifier::TrustPath;

    fn decoded(claims: Claims) -> DecodedToken {
        DecodedToken {
            claims,
            expires_at: Some(OffsetDateTime::now_utc() + Duration::minutes(10)),
            trust: TrustPath::LocalSecret,
        }
    }

    fn claims(pairs: &[(&str, serde_json::Value)]) -> Claims {
        let mut c = Claims::new();
        for (k, v) in pairs {
            c.insert_json(*k, v.clone());
        }
        c
    }

    #[test]
    fn user_token_parses_profile_and_roles() {
        let c = claims(&[
            (TOKEN_TYPE, json!("USER")),
            (USERNAME, json!("alice")),
            (FIRSTNAME, json!("Alice")),
            (EMAIL, json!("alice@example.org")),
            (ROLES, json!(["ROLE_USER", "ROLE_CURATOR", "ROLE_USER"])),
            (GROUPS, json!(["USERS"])),
            (GROUP_ID, json!("USERS")),
        ]);
        let token = parse_token("raw", &decoded(c)).unwrap();

        assert_eq!(token.variant(), TokenVariant::User);
        assert_eq!(token.principal_name(), "alice");
        assert_eq!(token.authorities().len(), 2);
        assert_eq!(token.groups(), &["USERS"]);
        assert_eq!(token.group_id(), Some("USERS"));
        let Principal::User(user) = token.principal() else {
            panic!("expected user principal");
        };
        assert_eq!(user.firstname.as_deref(), Some("Alice"));
        assert!(user.lastname.is_none());
    }

    #[test]
    fn missing_discriminator_is_user_with_no_mandatory_claims() {
        let c = claims(&[(SUBJECT, json!("bob"))]);
        let token = parse_token("raw", &decoded(c)).unwrap();
        assert_eq!(token.variant(), TokenVariant::User);
        assert_eq!(token.principal_name(), "bob");
        assert!(token.authorities().is_empty());
    }

    #[test]
    fn preferred_username_is_a_fallback() {
        let c = claims(&[(PREFERRED_USERNAME, json!("carol")), (SUBJECT, json!("c-123"))]);
        assert_eq!(
            parse_token("raw", &decoded(c)).unwrap().principal_name(),
            "carol"
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn unsupported_claims_are_ignored() {
        let c = claims(&[
            (USERNAME, json!("alice")),
            ("favouriteColour", json!("green")),
            (SOURCES, json!(["localhost"])),
        ]);
        assert!(parse_token("raw", &decoded(c)).is_ok());
        assert!(logs_contain("ignoring unsupported claim"));
    }

    #[test]
    fn malformed_roles_is_a_hard_failure() {
        let c = claims(&[(USERNAME, json!("alice")), (ROLES, json!("ROLE_USER"))]);
        assert!(matches!(
            parse_token("raw", &decoded(c)),
            Err(AuthError::InvalidAuthentication(_))
        ));
    }

    #[test]
    fn wrongly_typed_string_claim_fails() {
        let c = claims(&[(USERNAME, json!(42))]);
        assert!(matches!(
            parse_token("raw", &decoded(c)),
            Err(AuthError::InvalidAuthentication(_))
        ));
    }

    #[test]
    fn missing_principal_name_fails() {
        let c = claims(&[(TOKEN_TYPE, json!("SERVICE"))]);
        assert!(matches!(
            parse_token("raw", &decoded(c)),
            Err(AuthError::InvalidAuthentication(_))
        ));
    }

    #[test]
    fn missing_expiry_is_malformed() {
        let mut d = decoded(claims(&[(USERNAME, json!("alice"))]));
        d.expires_at = None;
        assert!(matches!(
            parse_token("raw", &d),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    #[tracing_test::traced_test]
    fn service_without_sources_warns() {
        let c = claims(&[(TOKEN_TYPE, json!("SERVICE")), (SERVICE_NAME, json!("indexer"))]);
        let token = parse_token("raw", &decoded(c)).unwrap();
        assert_eq!(token.variant(), TokenVariant::Service);
        assert!(logs_contain("service token carries no source restriction"));
    }

    #[test]
    fn service_sources_must_be_a_json_array() {
        let c = claims(&[
            (TOKEN_TYPE, json!("SERVICE")),
            (SERVICE_NAME, json!("indexer")),
            (SOURCES, json!("[\"localhost\"")),
        ]);
        assert!(matches!(
            parse_token("raw", &decoded(c)),
            Err(AuthError::InvalidAuthentication(_))
        ));
    }

    #[test]
    fn temporary_token_parses_grants() {
        let c = claims(&[
            (TOKEN_TYPE, json!("temporary")),
            (PRINCIPAL_NAME, json!("guest@example.org")),
            (
                PERMISSIONS,
                json!([{"resourceType": "DataResource", "resourceId": "7", "permission": "WRITE"}]),
            ),
        ]);
        let token = parse_token("raw", &decoded(c)).unwrap();
        assert_eq!(token.variant(), TokenVariant::Temporary);
        assert_eq!(
            token.scoped_permissions(),
            &[ScopedPermission::new("DataResource", "7", Permission::Write)]
        );
    }

    #[test]
    fn temporary_token_without_grants_is_rejected() {
        for perms in [None, Some(json!([]))] {
            let mut pairs = vec![
                (TOKEN_TYPE, json!("TEMPORARY")),
                (PRINCIPAL_NAME, json!("guest@example.org")),
            ];
            if let Some(p) = perms {
                pairs.push((PERMISSIONS, p));
            }
            assert_eq!(
                parse_token("raw", &decoded(claims(&pairs))).unwrap_err(),
                AuthError::NoPermissionsGranted
            );
        }
    }

    #[test]
    fn temporary_grant_with_null_permission_is_invalid() {
        let c = claims(&[
            (TOKEN_TYPE, json!("TEMPORARY")),
            (PRINCIPAL_NAME, json!("guest")),
            (
                PERMISSIONS,
                json!([{"resourceType": "DataResource", "resourceId": "7", "permission": null}]),
            ),
        ]);
        assert!(matches!(
            parse_token("raw", &decoded(c)),
            Err(AuthError::InvalidAuthentication(_))
        ));
    }
}
