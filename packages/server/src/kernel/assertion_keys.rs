//! Verification of provider-signed phone assertions.
//!
//! Production assertions are RS256 JWTs whose public keys are published as a
//! JWKS document. Keys are cached for the `max-age` the endpoint advertises
//! and refetched early when an assertion names a key id we have not seen,
//! at most once per [`MIN_REFRESH_INTERVAL`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use phone_verify::models::SigningKeys;
use phone_verify::{PhoneVerifyError, PhoneVerifyService};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{AssertedPhone, BaseAssertionVerifier, VerifyFailure};
use crate::domains::auth::SignedAssertion;

/// Clock skew tolerated on `exp` and `iat`, in seconds.
pub const CLOCK_LEEWAY_SECS: u64 = 60;

/// Cache lifetime when the key endpoint sends no `max-age`.
const FALLBACK_KEY_TTL: Duration = Duration::from_secs(60 * 60);

/// Minimum gap between key downloads. Assertions naming an unknown key id
/// inside this window are rejected without contacting the provider.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Claims every accepted assertion must satisfy.
#[derive(Debug, Clone)]
pub struct AssertionRules {
    pub issuer: String,
    pub audience: String,
    pub leeway_secs: u64,
    /// How long after the holder authenticated an assertion stays usable.
    pub max_auth_age: chrono::Duration,
}

impl AssertionRules {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_secs: CLOCK_LEEWAY_SECS,
            max_auth_age: chrono::Duration::minutes(10),
        }
    }

    fn ensure_configured(&self) -> Result<(), VerifyFailure> {
        if self.issuer.trim().is_empty() || self.audience.trim().is_empty() {
            return Err(VerifyFailure::Misconfigured(
                "assertion issuer or audience is not configured".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AssertionClaims {
    sub: String,
    iat: i64,
    #[serde(default)]
    auth_time: Option<i64>,
    #[serde(default)]
    phone_number: Option<String>,
}

/// Check signature, issuer, audience and freshness, then pull out the phone.
pub fn decode_assertion(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    rules: &AssertionRules,
) -> Result<AssertedPhone, VerifyFailure> {
    rules.ensure_configured()?;

    let mut validation = Validation::new(algorithm);
    validation.set_issuer(&[&rules.issuer]);
    validation.set_audience(&[&rules.audience]);
    validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);
    validation.leeway = rules.leeway_secs;

    let claims = decode::<AssertionClaims>(token, key, &validation)
        .map_err(|e| VerifyFailure::Invalid(e.to_string()))?
        .claims;

    let now = Utc::now().timestamp();
    let leeway = rules.leeway_secs as i64;

    if claims.iat > now + leeway {
        return Err(VerifyFailure::Invalid("issued in the future".to_string()));
    }

    if let Some(auth_time) = claims.auth_time {
        if auth_time > now + leeway {
            return Err(VerifyFailure::Invalid("authenticated in the future".to_string()));
        }
        if now - auth_time > rules.max_auth_age.num_seconds() {
            return Err(VerifyFailure::Invalid("authentication too old".to_string()));
        }
    }

    let phone = claims
        .phone_number
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| VerifyFailure::Invalid("missing phone_number claim".to_string()))?;

    let issued_at: DateTime<Utc> = Utc
        .timestamp_opt(claims.iat, 0)
        .single()
        .ok_or_else(|| VerifyFailure::Invalid("iat out of range".to_string()))?;

    Ok(AssertedPhone {
        phone,
        subject: claims.sub,
        issued_at,
    })
}

// =============================================================================
// Key source
// =============================================================================

/// Where signing keys come from. The provider client in production.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    async fn fetch(&self) -> Result<SigningKeys, PhoneVerifyError>;
}

#[async_trait]
impl SigningKeySource for PhoneVerifyService {
    async fn fetch(&self) -> Result<SigningKeys, PhoneVerifyError> {
        self.fetch_signing_keys().await
    }
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

// =============================================================================
// JWKS verifier
// =============================================================================

pub struct JwksAssertionVerifier {
    source: Arc<dyn SigningKeySource>,
    rules: AssertionRules,
    cache: RwLock<Option<CachedKeys>>,
    /// When the last download started, successful or not. Held across the
    /// download so concurrent misses share one request.
    last_attempt: Mutex<Option<Instant>>,
    min_refresh_interval: Duration,
}

impl JwksAssertionVerifier {
    pub fn new(source: Arc<dyn SigningKeySource>, rules: AssertionRules) -> Self {
        Self {
            source,
            rules,
            cache: RwLock::new(None),
            last_attempt: Mutex::new(None),
            min_refresh_interval: MIN_REFRESH_INTERVAL,
        }
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    async fn cached_key(&self, kid: &str) -> Option<DecodingKey> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|c| c.is_fresh())
            .and_then(|c| c.keys.get(kid).cloned())
    }

    /// Download the key set unless a download started less than
    /// `min_refresh_interval` ago. Failures keep whatever is cached.
    async fn refresh(&self) {
        let mut last_attempt = self.last_attempt.lock().await;
        if last_attempt.is_some_and(|at| at.elapsed() < self.min_refresh_interval) {
            debug!("signing key refresh throttled");
            return;
        }
        *last_attempt = Some(Instant::now());

        let fetched = match self.source.fetch().await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "failed to fetch assertion signing keys");
                return;
            }
        };

        let mut keys = HashMap::new();
        for jwk in fetched.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => warn!(kid = %jwk.kid, error = %e, "skipping malformed signing key"),
            }
        }

        if keys.is_empty() {
            warn!("key endpoint returned no usable keys");
            return;
        }

        debug!(count = keys.len(), "assertion signing keys refreshed");
        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
            ttl: fetched.max_age.unwrap_or(FALLBACK_KEY_TTL),
        });
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, VerifyFailure> {
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        self.refresh().await;

        // Stale keys beat no keys; only a cold cache is fatal.
        let cache = self.cache.read().await;
        let Some(cached) = cache.as_ref() else {
            return Err(VerifyFailure::Misconfigured(
                "signing keys unavailable".to_string(),
            ));
        };
        cached
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| VerifyFailure::Invalid(format!("unknown signing key {kid}")))
    }
}

#[async_trait]
impl BaseAssertionVerifier for JwksAssertionVerifier {
    async fn verify(&self, assertion: &SignedAssertion) -> Result<AssertedPhone, VerifyFailure> {
        self.rules.ensure_configured()?;

        let header = decode_header(assertion.as_str())
            .map_err(|e| VerifyFailure::Invalid(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(VerifyFailure::Invalid(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| VerifyFailure::Invalid("missing key id".to_string()))?;

        let key = self.key_for(&kid).await?;
        decode_assertion(assertion.as_str(), &key, Algorithm::RS256, &self.rules)
    }
}
