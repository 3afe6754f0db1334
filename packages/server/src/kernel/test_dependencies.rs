// TestDependencies - mock implementations for testing
//
// Provides a scripted verification provider and an HMAC assertion verifier so
// the whole auth flow can run without the network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::json;

use super::assertion_keys::{decode_assertion, AssertionRules};
use super::deps::ServerDeps;
use super::identity_store::MemoryIdentityStore;
use super::session_store::MemorySessionStore;
use super::{
    AssertedPhone, BaseAssertionVerifier, BaseVerificationProvider, ProviderError, VerifyFailure,
};
use crate::config::AuthSettings;
use crate::domains::auth::models::PhoneNumber;
use crate::domains::auth::{SignedAssertion, VerificationHandle};

pub const TEST_ASSERTION_SECRET: &str = "test-assertion-secret";
pub const TEST_ISSUER: &str = "https://securetoken.test/test-project";
pub const TEST_AUDIENCE: &str = "test-project";

// =============================================================================
// Mock Verification Provider
// =============================================================================

/// Arguments captured from a dispatch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchCall {
    pub phone: PhoneNumber,
    pub app_verification_token: Option<String>,
}

/// Provider double. Codes are accepted when they equal the configured
/// `valid_code`; the resulting assertion is minted for the dispatched phone.
pub struct MockVerificationProvider {
    valid_code: String,
    dispatch_calls: Arc<Mutex<Vec<DispatchCall>>>,
    fail_with: Arc<Mutex<Option<ProviderError>>>,
    handles: Arc<Mutex<Vec<(VerificationHandle, PhoneNumber)>>>,
}

impl MockVerificationProvider {
    pub fn new() -> Self {
        Self {
            valid_code: "123456".to_string(),
            dispatch_calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: Arc::new(Mutex::new(None)),
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make the next dispatch fail with `error`.
    pub fn fail_next_dispatch(&self, error: ProviderError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    /// Get all dispatch calls
    pub fn dispatch_calls(&self) -> Vec<DispatchCall> {
        self.dispatch_calls.lock().unwrap().clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatch_calls.lock().unwrap().len()
    }

    /// Check if a code was sent to `phone`
    pub fn was_dispatched_to(&self, phone: &str) -> bool {
        self.dispatch_calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.phone.as_str() == phone)
    }
}

impl Default for MockVerificationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseVerificationProvider for MockVerificationProvider {
    async fn dispatch_code(
        &self,
        phone: &PhoneNumber,
        app_verification_token: Option<&str>,
    ) -> Result<VerificationHandle, ProviderError> {
        self.dispatch_calls.lock().unwrap().push(DispatchCall {
            phone: phone.clone(),
            app_verification_token: app_verification_token.map(str::to_string),
        });

        if let Some(error) = self.fail_with.lock().unwrap().take() {
            return Err(error);
        }

        let handle = VerificationHandle::new(format!("handle-{}", self.dispatch_count()));
        let mut handles = self.handles.lock().unwrap();
        // A new dispatch invalidates earlier handles for the same phone.
        handles.retain(|(_, p)| p != phone);
        handles.push((handle.clone(), phone.clone()));
        Ok(handle)
    }

    async fn exchange_for_assertion(
        &self,
        handle: &VerificationHandle,
        code: &str,
    ) -> Result<SignedAssertion, ProviderError> {
        let phone = self
            .handles
            .lock()
            .unwrap()
            .iter()
            .find(|(h, _)| h == handle)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| ProviderError::CodeRejected("SESSION_EXPIRED".to_string()))?;

        if code != self.valid_code {
            return Err(ProviderError::CodeRejected("INVALID_CODE".to_string()));
        }

        Ok(mint_assertion(phone.as_str()))
    }
}

// =============================================================================
// HMAC Assertion Verifier
// =============================================================================

/// Verifies HS256 assertions with the same claim rules as production.
pub struct HmacAssertionVerifier {
    key: DecodingKey,
    rules: AssertionRules,
}

impl HmacAssertionVerifier {
    pub fn new(secret: &str, rules: AssertionRules) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            rules,
        }
    }
}

impl Default for HmacAssertionVerifier {
    fn default() -> Self {
        Self::new(
            TEST_ASSERTION_SECRET,
            AssertionRules::new(TEST_ISSUER, TEST_AUDIENCE),
        )
    }
}

#[async_trait]
impl BaseAssertionVerifier for HmacAssertionVerifier {
    async fn verify(&self, assertion: &SignedAssertion) -> Result<AssertedPhone, VerifyFailure> {
        decode_assertion(assertion.as_str(), &self.key, Algorithm::HS256, &self.rules)
    }
}

/// Fresh assertion for `phone` signed with the test secret.
pub fn mint_assertion(phone: &str) -> SignedAssertion {
    mint_assertion_with(json!({ "phone_number": phone }))
}

/// Assertion with the standard fresh claims, overridden by `overrides`.
pub fn mint_assertion_with(overrides: serde_json::Value) -> SignedAssertion {
    let now = Utc::now().timestamp();
    let mut claims = json!({
        "iss": TEST_ISSUER,
        "aud": TEST_AUDIENCE,
        "sub": "provider-user",
        "iat": now,
        "exp": now + 3600,
        "auth_time": now,
    });
    if let (Some(base), Some(extra)) = (claims.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_ASSERTION_SECRET.as_bytes()),
    )
    .expect("test assertion encodes");
    SignedAssertion::new(token)
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Fully in-memory dependency set with handles on every double.
pub struct TestDependencies {
    pub identities: Arc<MemoryIdentityStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub provider: Arc<MockVerificationProvider>,
    pub verifier: Arc<dyn BaseAssertionVerifier>,
    pub settings: AuthSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            identities: Arc::new(MemoryIdentityStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            provider: Arc::new(MockVerificationProvider::new()),
            verifier: Arc::new(HmacAssertionVerifier::default()),
            settings: AuthSettings::default(),
        }
    }

    /// Swap the assertion verifier, e.g. for one that is misconfigured.
    pub fn with_verifier(mut self, verifier: Arc<dyn BaseAssertionVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.identities.clone(),
            self.sessions.clone(),
            self.provider.clone(),
            self.verifier.clone(),
            self.settings.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
