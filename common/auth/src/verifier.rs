use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::VerifiedPayload;
use crate::config::AuthConfig;
use crate::error::{AuthResult, TokenError};
use crate::keyset::RemoteKeySet;

/// Checks signature, lifetime, issuer and (optionally) audience of a compact JWS.
pub struct ClaimsVerifier {
    keys: Arc<RemoteKeySet>,
    issuer: String,
    audience: Option<String>,
    leeway_seconds: u32,
}

impl ClaimsVerifier {
    pub fn new(keys: Arc<RemoteKeySet>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: None,
            leeway_seconds: 0,
        }
    }

    /// Issuer, audience and leeway taken from `config`.
    pub fn from_config(keys: Arc<RemoteKeySet>, config: &AuthConfig) -> Self {
        let verifier = Self::new(keys, config.issuer()).with_leeway(config.leeway_seconds);
        match &config.client_id {
            Some(client_id) => verifier.with_audience(client_id.clone()),
            None => verifier,
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub fn key_set(&self) -> &RemoteKeySet {
        &self.keys
    }

    pub async fn verify(&self, token: &str) -> AuthResult<VerifiedPayload> {
        Ok(self.verify_token(token).await?)
    }

    async fn verify_token(&self, token: &str) -> Result<VerifiedPayload, TokenError> {
        let header =
            decode_header(token).map_err(|err| TokenError::InvalidHeader(err.to_string()))?;
        let candidates = self.keys.keys_for(&header).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }
        validation.validate_nbf = true;
        validation.leeway = self.leeway_seconds.into();

        let mut last_error = TokenError::NoMatchingKey;
        for key in &candidates {
            match decode::<Value>(token, key, &validation) {
                Ok(data) => {
                    debug!(kid = ?header.kid, alg = ?header.alg, "verified JWT successfully");
                    return Ok(VerifiedPayload::new(data.claims));
                }
                // Another candidate may hold the right key.
                Err(err) if matches!(err.kind(), ErrorKind::InvalidSignature) => {
                    last_error = err.into();
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(last_error)
    }
}
