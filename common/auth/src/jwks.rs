use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::ConfigError;
use crate::error::TokenError;

/// Where signing keys come from. The HTTP fetcher is the production source.
#[async_trait]
pub trait JwksSource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, TokenError>;

    /// Human-readable origin used in logs.
    fn describe(&self) -> &str;
}

#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

impl JwksFetcher {
    /// Build a fetcher whose requests are bounded by `timeout`. No request is sent.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl JwksSource for JwksFetcher {
    async fn fetch(&self) -> Result<JwkSet, TokenError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| TokenError::JwksFetch(err.to_string()))?;

        if !response.status().is_success() {
            return Err(TokenError::JwksFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: JwksResponse = response
            .json()
            .await
            .map_err(|err| TokenError::JwksDecode(err.to_string()))?;

        Ok(body.into_key_set())
    }

    fn describe(&self) -> &str {
        &self.url
    }
}

/// Keys are parsed one by one so a single exotic entry doesn't poison the set.
#[derive(Debug, Deserialize)]
pub(crate) struct JwksResponse {
    keys: Vec<Value>,
}

impl JwksResponse {
    pub(crate) fn into_key_set(self) -> JwkSet {
        let keys = self
            .keys
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Jwk>(entry) {
                Ok(jwk) => Some(jwk),
                Err(err) => {
                    warn!(error = %err, "skipping unparseable JWKS entry");
                    None
                }
            })
            .collect();
        JwkSet { keys }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    // 2048-bit modulus from RFC 7517 appendix A.1.
    const MODULUS: &str = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";

    #[tokio::test]
    async fn fetch_parses_key_set_and_skips_unknown_entries() {
        let server = MockServer::start_async().await;
        let body = json!({
            "keys": [
                { "kid": "sig-key", "kty": "RSA", "alg": "RS256", "use": "sig", "n": MODULUS, "e": "AQAB" },
                { "kid": "odd-key", "kty": "XYZ", "alg": "RS256" }
            ]
        });
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/realms/academy/protocol/openid-connect/certs");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(body.to_string());
            })
            .await;

        let fetcher = JwksFetcher::new(
            server.url("/realms/academy/protocol/openid-connect/certs"),
            Duration::from_secs(2),
        )
        .expect("client");
        let set = fetcher.fetch().await.expect("fetch succeeds");

        mock.assert_async().await;
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.keys[0].common.key_id.as_deref(), Some("sig-key"));
    }

    #[tokio::test]
    async fn fetch_reports_http_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(503);
            })
            .await;

        let fetcher = JwksFetcher::new(server.url("/certs"), Duration::from_secs(2)).expect("client");
        let err = fetcher.fetch().await.expect_err("fetch fails");
        assert!(matches!(err, TokenError::JwksFetch(message) if message.contains("503")));
    }

    #[tokio::test]
    async fn fetch_reports_non_jwks_bodies() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200).body("not json");
            })
            .await;

        let fetcher = JwksFetcher::new(server.url("/certs"), Duration::from_secs(2)).expect("client");
        let err = fetcher.fetch().await.expect_err("fetch fails");
        assert!(matches!(err, TokenError::JwksDecode(_)));
    }
}
