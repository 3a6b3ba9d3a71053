//! Configuration for the authenticator.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format as _, Yaml};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Prefix of environment overrides, e.g. `REPO_AUTHN__LOCAL_SECRET`.
pub const ENV_PREFIX: &str = "REPO_AUTHN__";

/// Upper bound on `leeway_secs`: one day.
pub const MAX_LEEWAY_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC-SHA256 key of the local-secret trust path.
    pub local_secret: Option<SecretString>,

    /// Key set endpoint of the remote trust path.
    pub issuer_jwks_url: Option<String>,

    /// Audience remote tokens must name. Required with `issuer_jwks_url`.
    pub expected_audience: Option<String>,

    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,

    /// Upper bound on the key set response body.
    pub size_limit_bytes: u64,

    pub key_set_ttl_secs: u64,

    /// Minimum age of the cached key set before an unknown `kid` may trigger a refresh.
    pub key_set_min_refresh_secs: u64,

    /// Tolerated clock skew when checking `exp`.
    pub leeway_secs: u64,

    /// Fetch the key set during initialisation, failing startup when it is unreachable.
    pub eager_key_fetch: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            local_secret: None,
            issuer_jwks_url: None,
            expected_audience: None,
            connect_timeout_ms: 2_000,
            read_timeout_ms: 5_000,
            size_limit_bytes: 64 * 1024,
            key_set_ttl_secs: 3_600,
            key_set_min_refresh_secs: 30,
            leeway_secs: 0,
            eager_key_fetch: true,
        }
    }
}

impl AuthConfig {
    /// Layers defaults, the YAML file at `path` (if given and present) and `REPO_AUTHN__*`
    /// environment variables, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a source cannot be parsed and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no trust path is configured, the key set URL does
    /// not parse, the remote path lacks an audience, a limit is zero, or the leeway exceeds
    /// [`MAX_LEEWAY_SECS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_secret.is_none() && self.issuer_jwks_url.is_none() {
            return Err(ConfigError::Invalid(
                "either local_secret or issuer_jwks_url must be set".to_owned(),
            ));
        }
        if self.issuer_jwks_url.is_some() {
            self.jwks_url()?;
            if self
                .expected_audience
                .as_deref()
                .is_none_or(|a| a.trim().is_empty())
            {
                return Err(ConfigError::Invalid(
                    "expected_audience is required with issuer_jwks_url".to_owned(),
                ));
            }
        }
        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("size_limit_bytes", self.size_limit_bytes),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if self.leeway_secs > MAX_LEEWAY_SECS {
            return Err(ConfigError::Invalid(format!(
                "leeway_secs must not exceed {MAX_LEEWAY_SECS}"
            )));
        }
        Ok(())
    }

    /// Parsed key set endpoint, if the remote path is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL does not parse.
    pub fn jwks_url(&self) -> Result<Option<Url>, ConfigError> {
        self.issuer_jwks_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| ConfigError::Invalid(format!("issuer_jwks_url '{raw}': {e}")))
            })
            .transpose()
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[must_use]
    pub fn key_set_ttl(&self) -> Duration {
        Duration::from_secs(self.key_set_ttl_secs)
    }

    #[must_use]
    pub fn key_set_min_refresh(&self) -> Duration {
        Duration::from_secs(self.key_set_min_refresh_secs)
    }

    #[must_use]
    pub fn leeway(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.leeway_secs).unwrap_or(i64::MAX))
    }
}
