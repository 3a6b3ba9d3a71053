use std::sync::Arc;

use anyhow::Context as _;
use repo_security::{AuthorizationContext, Principal};
use secrecy::ExposeSecret as _;
use time::{Duration, OffsetDateTime};

use super::claims;
use super::error::AuthError;
use super::origin::{HostResolver, SystemResolver, check_origin};
use super::parser::parse_token;
use super::verifier::{
    HttpKeySetSource, KeySetCache, LocalSecretVerifier, RemoteKeySetVerifier, SignatureVerifier,
    TrustVerifier,
};
use crate::config::AuthConfig;

const BEARER: &str = "bearer";

/// Turns a request's `Authorization` header and remote address into an [`AuthorizationContext`].
///
/// Stateless apart from the remote key set cache; safe to share across threads.
pub struct Authenticator {
    verifier: Arc<dyn SignatureVerifier>,
    resolver: Arc<dyn HostResolver>,
    leeway: Duration,
}

impl Authenticator {
    #[must_use]
    pub fn new(verifier: Arc<dyn SignatureVerifier>, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            verifier,
            resolver,
            leeway: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Builds the trust paths `config` enables.
    ///
    /// With `eager_key_fetch` the remote key set is fetched here, and an unreachable issuer
    /// fails initialisation.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the eager fetch fails.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let local = config
            .local_secret
            .as_ref()
            .map(|s| LocalSecretVerifier::new(s.expose_secret().as_bytes()));

        let remote = match config.jwks_url()? {
            Some(url) => {
                let audience = config
                    .expected_audience
                    .clone()
                    .context("expected_audience is required with issuer_jwks_url")?;
                tracing::info!(%url, %audience, "remote key set trust path enabled");
                let source = HttpKeySetSource::new(
                    url,
                    config.connect_timeout(),
                    config.read_timeout(),
                    config.size_limit_bytes,
                );
                let cache = KeySetCache::new(
                    Box::new(source),
                    config.key_set_ttl(),
                    config.key_set_min_refresh(),
                );
                if config.eager_key_fetch {
                    cache
                        .refresh()
                        .context("initial fetch of the remote key set failed")?;
                }
                Some(RemoteKeySetVerifier::new(cache, audience))
            }
            None => None,
        };

        let verifier = TrustVerifier::new(local, remote)?;
        Ok(Self::new(Arc::new(verifier), Arc::new(SystemResolver)).with_leeway(config.leeway()))
    }

    /// Authenticates one request.
    ///
    /// No header means an anonymous context. Anything else must be a valid bearer token:
    /// a rejected token is never downgraded to anonymous.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] that rejected the request.
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
        remote_addr: &str,
    ) -> Result<AuthorizationContext, AuthError> {
        self.authenticate_at(authorization, remote_addr, OffsetDateTime::now_utc())
    }

    /// [`Authenticator::authenticate`] as of `now`.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] that rejected the request.
    pub fn authenticate_at(
        &self,
        authorization: Option<&str>,
        remote_addr: &str,
        now: OffsetDateTime,
    ) -> Result<AuthorizationContext, AuthError> {
        let Some(header) = authorization else {
            return Ok(AuthorizationContext::anonymous());
        };

        self.validate(header, remote_addr, now)
            .map(AuthorizationContext::authenticated)
            .inspect_err(|e| log_rejection(e, remote_addr))
    }

    fn validate(
        &self,
        header: &str,
        remote_addr: &str,
        now: OffsetDateTime,
    ) -> Result<repo_security::Token, AuthError> {
        let raw = bearer_token(header).ok_or(AuthError::MissingCredentials)?;
        let skewed = now
            .checked_sub(self.leeway)
            .ok_or_else(|| AuthError::Internal("clock leeway out of range".to_owned()))?;
        let decoded = claims::decode_at(raw, self.verifier.as_ref(), skewed)?;
        let token = parse_token(raw, &decoded)?;

        // An empty allow-list matches no caller.
        if let Principal::Service(service) = token.principal()
            && let Some(sources) = service.sources.as_deref()
        {
            check_origin(remote_addr, sources, self.resolver.as_ref())?;
        }

        tracing::debug!(
            principal = token.principal_name(),
            variant = %token.variant(),
            trust = ?decoded.trust,
            "request authenticated"
        );
        Ok(token)
    }
}

/// The credential of a `Bearer` header; the scheme is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(BEARER) && !token.is_empty()).then_some(token)
}

fn log_rejection(e: &AuthError, remote_addr: &str) {
    match e {
        AuthError::KeySetUnavailable(_) | AuthError::Internal(_) => {
            tracing::error!(error = %e, remote_addr, "authentication failed");
        }
        _ => tracing::debug!(error = %e, remote_addr, "token rejected"),
    }
}
