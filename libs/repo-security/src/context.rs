//! Per-request authorization context.

use std::collections::BTreeSet;

use secrecy::SecretString;
use time::OffsetDateTime;

use crate::permission::ScopedPermission;
use crate::token::{Token, TokenVariant};

/// Principal name reported for requests that presented no token.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymousUser";

static NO_AUTHORITIES: BTreeSet<String> = BTreeSet::new();

/// `AuthorizationContext` is the validated, queryable identity of one in-flight request.
///
/// Built by the authenticator from a bearer token and passed explicitly through the call chain.
/// Downstream code uses it directly or through the scoped permission evaluator.
/// A request without any token gets [`AuthorizationContext::anonymous`].
#[derive(Debug, Clone, Default)]
pub struct AuthorizationContext {
    token: Option<Token>,
}

impl AuthorizationContext {
    /// Context of a request that presented no token.
    #[must_use]
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    /// Context backed by a validated token.
    #[must_use]
    pub fn authenticated(token: Token) -> Self {
        Self { token: Some(token) }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.token.is_none()
    }

    /// The validated token, absent for anonymous requests.
    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn variant(&self) -> Option<TokenVariant> {
        self.token.as_ref().map(Token::variant)
    }

    #[must_use]
    pub fn principal_name(&self) -> &str {
        self.token
            .as_ref()
            .map_or(ANONYMOUS_PRINCIPAL, Token::principal_name)
    }

    /// Granted role strings. Never null: anonymous requests get an empty set.
    #[must_use]
    pub fn authorities(&self) -> &BTreeSet<String> {
        self.token
            .as_ref()
            .map_or(&NO_AUTHORITIES, Token::authorities)
    }

    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities().contains(authority)
    }

    /// Whether at least one of `authorities` was granted.
    #[must_use]
    pub fn has_any_authority<I, S>(&self, authorities: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let granted = self.authorities();
        authorities
            .into_iter()
            .any(|a| granted.contains(a.as_ref()))
    }

    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.token.as_ref().and_then(Token::group_id)
    }

    #[must_use]
    pub fn groups(&self) -> &[String] {
        self.token.as_ref().map(Token::groups).unwrap_or_default()
    }

    #[must_use]
    pub fn scoped_permissions(&self) -> &[ScopedPermission] {
        self.token
            .as_ref()
            .map(Token::scoped_permissions)
            .unwrap_or_default()
    }

    /// The grant for `(resource_type, resource_id)`, if the token carries one.
    #[must_use]
    pub fn scoped_permission(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Option<&ScopedPermission> {
        self.scoped_permissions()
            .iter()
            .find(|p| p.applies_to(resource_type, resource_id))
    }

    /// Original bearer token for forwarding to downstream services.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&SecretString> {
        self.token.as_ref().map(Token::raw_token)
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.token.as_ref().map(Token::expires_at)
    }
}

impl From<Token> for AuthorizationContext {
    fn from(token: Token) -> Self {
        Self::authenticated(token)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use secrecy::ExposeSecret;
    use time::Duration;

    use super::*;
    use crate::permission::Permission;
    use crate::token::{Principal, TemporaryPrincipal, TokenParts, UserPrincipal};

    fn parts(name: &str, roles: &[&str]) -> TokenParts {
        TokenParts {
            raw_token: SecretString::from("header.payload.signature".to_owned()),
            principal_name: name.to_owned(),
            group_id: Some("USERS".to_owned()),
            groups: vec!["USERS".to_owned(), "CURATORS".to_owned()],
            authorities: roles.iter().map(|r| (*r).to_owned()).collect(),
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(5),
        }
    }

    #[test]
    fn anonymous_context_is_empty() {
        let ctx = AuthorizationContext::anonymous();

        assert!(ctx.is_anonymous());
        assert_eq!(ctx.principal_name(), ANONYMOUS_PRINCIPAL);
        assert!(ctx.authorities().is_empty());
        assert!(ctx.groups().is_empty());
        assert!(ctx.group_id().is_none());
        assert!(ctx.scoped_permissions().is_empty());
        assert!(ctx.bearer_token().is_none());
        assert!(ctx.variant().is_none());
        assert!(ctx.expires_at().is_none());
    }

    #[test]
    fn user_context_exposes_token_attributes() {
        let token = Token::new(
            parts("alice", &["ROLE_USER", "ROLE_CURATOR"]),
            Principal::User(UserPrincipal {
                email: Some("alice@example.org".to_owned()),
                ..UserPrincipal::default()
            }),
        )
        .unwrap();
        let ctx = AuthorizationContext::from(token);

        assert!(!ctx.is_anonymous());
        assert_eq!(ctx.principal_name(), "alice");
        assert_eq!(ctx.variant(), Some(TokenVariant::User));
        assert!(ctx.has_authority("ROLE_CURATOR"));
        assert!(!ctx.has_authority("ROLE_ADMINISTRATOR"));
        assert!(ctx.has_any_authority(["ROLE_ADMINISTRATOR", "ROLE_USER"]));
        assert!(!ctx.has_any_authority(Vec::<String>::new()));
        assert_eq!(ctx.group_id(), Some("USERS"));
        assert_eq!(ctx.groups(), &["USERS", "CURATORS"]);
        assert_eq!(
            ctx.bearer_token().map(ExposeSecret::expose_secret),
            Some("header.payload.signature")
        );
    }

    #[test]
    fn temporary_context_looks_up_scoped_permission() {
        let grant = ScopedPermission::new("DataResource", "7", Permission::Write);
        let token = Token::new(
            parts("guest@example.org", &[]),
            Principal::Temporary(TemporaryPrincipal::new(vec![grant.clone()]).unwrap()),
        )
        .unwrap();
        let ctx = AuthorizationContext::authenticated(token);

        assert_eq!(ctx.variant(), Some(TokenVariant::Temporary));
        assert_eq!(ctx.scoped_permission("DataResource", "7"), Some(&grant));
        assert!(ctx.scoped_permission("DataResource", "8").is_none());
    }

    #[test]
    fn bearer_token_is_redacted_in_debug_output() {
        let token = Token::new(
            parts("alice", &[]),
            Principal::User(UserPrincipal::default()),
        )
        .unwrap();
        let ctx = AuthorizationContext::authenticated(token);

        let rendered = format!("{ctx:?}");
        assert!(!rendered.contains("header.payload.signature"));
    }
}
