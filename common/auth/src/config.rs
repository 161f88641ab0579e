use std::env;
use std::time::Duration;

use thiserror::Error;

/// Upper bound on a single JWKS request.
pub const DEFAULT_JWKS_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a fetched key set is trusted before it is fetched again.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);
/// Minimum age of the cached key set before an unknown `kid` may trigger a re-fetch.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidVar { name: &'static str, value: String },
    #[error("failed to build JWKS HTTP client: {0}")]
    HttpClient(String),
}

/// Runtime configuration for token validation against a Keycloak realm.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Keycloak base URL, e.g. `https://sso.example.com`.
    pub base_url: String,
    /// Realm name.
    pub realm: String,
    /// Expected audience (aud). Audience checks are skipped when unset.
    pub client_id: Option<String>,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
    pub jwks_timeout: Duration,
    pub cache_ttl: Duration,
    pub refresh_cooldown: Duration,
}

impl AuthConfig {
    /// Construct config with no audience check and zero leeway.
    pub fn new(base_url: impl Into<String>, realm: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            realm: realm.into(),
            client_id: None,
            leeway_seconds: 0,
            jwks_timeout: DEFAULT_JWKS_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_jwks_timeout(mut self, timeout: Duration) -> Self {
        self.jwks_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// Expected `iss` claim: `{base_url}/realms/{realm}`.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.base_url, self.realm)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.issuer())
    }

    /// Load from `KEYCLOAK_URL`, `KEYCLOAK_REALM` and the optional overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = required_var("KEYCLOAK_URL")?;
        let realm = required_var("KEYCLOAK_REALM")?;
        let mut config = Self::new(base_url, realm);

        if let Some(client_id) = optional_var("KEYCLOAK_CLIENT_ID") {
            config = config.with_client_id(client_id);
        }
        if let Some(secs) = secs_from_env("AUTH_JWKS_TIMEOUT_SECS")? {
            config = config.with_jwks_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = secs_from_env("AUTH_JWKS_CACHE_TTL_SECS")? {
            config = config.with_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = secs_from_env("AUTH_JWKS_COOLDOWN_SECS")? {
            config = config.with_refresh_cooldown(Duration::from_secs(secs));
        }
        if let Some(secs) = secs_from_env("AUTH_LEEWAY_SECS")? {
            let leeway = u32::try_from(secs).map_err(|_| ConfigError::InvalidVar {
                name: "AUTH_LEEWAY_SECS",
                value: secs.to_string(),
            })?;
            config = config.with_leeway(leeway);
        }

        Ok(config)
    }
}

fn optional_var(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::MissingVar(name))
}

fn secs_from_env(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match optional_var(name) {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { name, value }),
        None => Ok(None),
    }
}
