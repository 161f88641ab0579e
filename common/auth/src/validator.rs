use std::sync::Arc;

use crate::bearer;
use crate::claims::Claims;
use crate::config::{AuthConfig, ConfigError};
use crate::context::AuthContext;
use crate::error::AuthResult;
use crate::jwks::{JwksFetcher, JwksSource};
use crate::keyset::RemoteKeySet;
use crate::verifier::ClaimsVerifier;

/// Turns bearer credentials into an [`AuthContext`].
///
/// One instance per process, shared behind an `Arc`; it owns the key cache.
pub struct AuthValidator {
    verifier: ClaimsVerifier,
}

impl AuthValidator {
    /// Validator backed by the realm's JWKS endpoint. Performs no network I/O.
    pub fn new(config: AuthConfig) -> Result<Self, ConfigError> {
        let fetcher = JwksFetcher::new(config.jwks_url(), config.jwks_timeout)?;
        Ok(Self::with_source(config, Arc::new(fetcher)))
    }

    /// Validator with an injected key source.
    pub fn with_source(config: AuthConfig, source: Arc<dyn JwksSource>) -> Self {
        let keys = RemoteKeySet::new(source)
            .with_fetch_timeout(config.jwks_timeout)
            .with_cache_ttl(config.cache_ttl)
            .with_refresh_cooldown(config.refresh_cooldown);
        Self {
            verifier: ClaimsVerifier::from_config(Arc::new(keys), &config),
        }
    }

    pub fn verifier(&self) -> &ClaimsVerifier {
        &self.verifier
    }

    /// verify → schema → identity.
    pub async fn validate(&self, token: &str) -> AuthResult<AuthContext> {
        let payload = self.verifier.verify(token).await?;
        let claims = Claims::parse(&payload)?;
        Ok(AuthContext::from_claims(claims))
    }

    /// `Ok(None)` when no bearer credential was presented at all.
    pub async fn authenticate(&self, authorization: Option<&str>) -> AuthResult<Option<AuthContext>> {
        match bearer::extract(authorization) {
            Some(token) => self.validate(token).await.map(Some),
            None => Ok(None),
        }
    }
}
