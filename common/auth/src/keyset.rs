use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Instant};
use tracing::{info, warn};

use crate::config::{DEFAULT_CACHE_TTL, DEFAULT_JWKS_TIMEOUT, DEFAULT_REFRESH_COOLDOWN};
use crate::error::TokenError;
use crate::jwks::JwksSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    EllipticCurve,
    OctetKeyPair,
}

impl KeyFamily {
    /// Symmetric algorithms are never accepted from a public key set.
    fn for_algorithm(alg: Algorithm) -> Result<Self, TokenError> {
        match alg {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Ok(Self::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Ok(Self::EllipticCurve),
            Algorithm::EdDSA => Ok(Self::OctetKeyPair),
            other => Err(TokenError::UnsupportedAlgorithm(other)),
        }
    }

    fn for_jwk(jwk: &Jwk) -> Option<Self> {
        match jwk.algorithm {
            AlgorithmParameters::RSA(_) => Some(Self::Rsa),
            AlgorithmParameters::EllipticCurve(_) => Some(Self::EllipticCurve),
            AlgorithmParameters::OctetKeyPair(_) => Some(Self::OctetKeyPair),
            AlgorithmParameters::OctetKey(_) => None,
        }
    }
}

fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

#[derive(Clone)]
struct KeyEntry {
    kid: Option<String>,
    family: KeyFamily,
    /// `None` when the JWK doesn't pin an algorithm.
    alg: Option<Algorithm>,
    key: DecodingKey,
}

impl KeyEntry {
    fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let kid = jwk.common.key_id.clone();
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            return None;
        }
        let family = KeyFamily::for_jwk(jwk)?;
        let alg = match &jwk.common.key_algorithm {
            Some(key_alg) => Some(signing_algorithm(key_alg)?),
            None => None,
        };

        match DecodingKey::from_jwk(jwk) {
            Ok(key) => Some(Self {
                kid,
                family,
                alg,
                key,
            }),
            Err(err) => {
                warn!(kid = ?kid, error = %err, "skipping JWK that cannot be used for verification");
                None
            }
        }
    }

    fn accepts(&self, header: &Header, family: KeyFamily) -> bool {
        if let Some(kid) = &header.kid {
            if self.kid.as_deref() != Some(kid.as_str()) {
                return false;
            }
        }
        self.family == family && self.alg.map_or(true, |alg| alg == header.alg)
    }
}

struct CachedKeys {
    generation: u64,
    fetched_at: Instant,
    keys: Vec<KeyEntry>,
}

impl CachedKeys {
    fn matching(&self, header: &Header, family: KeyFamily) -> Vec<DecodingKey> {
        self.keys
            .iter()
            .filter(|entry| entry.accepts(header, family))
            .map(|entry| entry.key.clone())
            .collect()
    }
}

/// Bookkeeping guarded by the refresh lock.
#[derive(Default)]
struct RefreshState {
    generation: u64,
    /// Error from the most recent attempt, cleared by the next success.
    last_failure: Option<TokenError>,
}

/// Cached view of a remote JSON Web Key Set.
///
/// Nothing is fetched until the first lookup. Readers share the cached set;
/// refreshes are single-flight.
pub struct RemoteKeySet {
    source: Arc<dyn JwksSource>,
    fetch_timeout: Duration,
    cache_ttl: Duration,
    refresh_cooldown: Duration,
    cached: RwLock<Option<Arc<CachedKeys>>>,
    /// Finished refresh attempts, successful or not.
    attempts: AtomicU64,
    refresh_lock: Mutex<RefreshState>,
}

impl RemoteKeySet {
    pub fn new(source: Arc<dyn JwksSource>) -> Self {
        Self {
            source,
            fetch_timeout: DEFAULT_JWKS_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            cached: RwLock::new(None),
            attempts: AtomicU64::new(0),
            refresh_lock: Mutex::new(RefreshState::default()),
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub fn with_refresh_cooldown(mut self, refresh_cooldown: Duration) -> Self {
        self.refresh_cooldown = refresh_cooldown;
        self
    }

    pub fn source(&self) -> &str {
        self.source.describe()
    }

    /// Number of keys currently cached, fresh or not.
    pub async fn cached_key_count(&self) -> usize {
        self.cached
            .read()
            .await
            .as_ref()
            .map_or(0, |cached| cached.keys.len())
    }

    /// Keys that may have signed a token with this header, in set order.
    pub async fn keys_for(&self, header: &Header) -> Result<Vec<DecodingKey>, TokenError> {
        let family = KeyFamily::for_algorithm(header.alg)?;

        let current = self.cached.read().await.clone();
        let cached = match current {
            Some(cached) if cached.fetched_at.elapsed() < self.cache_ttl => cached,
            other => self.refresh(other.map(|cached| cached.generation)).await?,
        };

        let keys = cached.matching(header, family);
        if !keys.is_empty() {
            return Ok(keys);
        }

        // Unknown key: the issuer may have rotated since the last fetch.
        if cached.fetched_at.elapsed() >= self.refresh_cooldown {
            let refreshed = self.refresh(Some(cached.generation)).await?;
            let keys = refreshed.matching(header, family);
            if !keys.is_empty() {
                return Ok(keys);
            }
        }

        Err(TokenError::NoMatchingKey)
    }

    /// Fetch unconditionally, replacing the cached set on success.
    pub async fn refresh_now(&self) -> Result<usize, TokenError> {
        let observed = self.cached.read().await.as_ref().map(|cached| cached.generation);
        let refreshed = self.refresh(observed).await?;
        Ok(refreshed.keys.len())
    }

    /// Single-flight refresh. `observed` is the generation the caller found
    /// unusable. Callers that queued behind an attempt share its outcome,
    /// failures included, instead of fetching again.
    async fn refresh(&self, observed: Option<u64>) -> Result<Arc<CachedKeys>, TokenError> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh_lock.lock().await;

        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(err) = &state.last_failure {
                return Err(err.clone());
            }
        }

        if let Some(current) = self.cached.read().await.clone() {
            if Some(current.generation) != observed {
                return Ok(current);
            }
        }

        let outcome = match timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(Ok(set)) => Ok(set),
            Ok(Err(err)) => {
                warn!(source = self.source.describe(), error = %err, "JWKS refresh failed");
                Err(err)
            }
            Err(_) => {
                warn!(source = self.source.describe(), timeout = ?self.fetch_timeout, "JWKS refresh timed out");
                Err(TokenError::JwksTimeout(self.fetch_timeout))
            }
        };

        let set: JwkSet = match outcome {
            Ok(set) => set,
            Err(err) => {
                state.last_failure = Some(err.clone());
                self.attempts.fetch_add(1, Ordering::Release);
                return Err(err);
            }
        };

        let keys: Vec<KeyEntry> = set.keys.iter().filter_map(KeyEntry::from_jwk).collect();
        state.generation += 1;
        state.last_failure = None;
        let cached = Arc::new(CachedKeys {
            generation: state.generation,
            fetched_at: Instant::now(),
            keys,
        });
        info!(
            source = self.source.describe(),
            keys = cached.keys.len(),
            "refreshed JWKS"
        );

        *self.cached.write().await = Some(cached.clone());
        self.attempts.fetch_add(1, Ordering::Release);
        Ok(cached)
    }
}
