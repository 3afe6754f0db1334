//! Server dependencies for the auth actions (using traits for testability)
//!
//! This module provides the central dependency container used by every auth
//! action. All external services sit behind trait objects so tests can swap
//! them for the doubles in `test_dependencies`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use phone_verify::{PhoneVerifyError, PhoneVerifyService};
use tracing::warn;

use crate::config::AuthSettings;
use crate::domains::auth::models::{PhoneNormalizer, PhoneNumber};
use crate::domains::auth::{AssertionValidator, SessionIssuer, SignedAssertion, VerificationHandle};
use crate::kernel::{
    BaseAssertionVerifier, BaseIdentityStore, BaseSessionStore, BaseVerificationProvider,
    ProviderError,
};

// =============================================================================
// PhoneVerifyService Adapter (implements BaseVerificationProvider trait)
// =============================================================================

/// Wrapper around PhoneVerifyService that implements BaseVerificationProvider
pub struct PhoneVerifyAdapter {
    service: Arc<PhoneVerifyService>,
    timeout: Duration,
}

impl PhoneVerifyAdapter {
    pub fn new(service: Arc<PhoneVerifyService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }
}

fn provider_error(err: PhoneVerifyError) -> ProviderError {
    match err {
        PhoneVerifyError::InvalidPhoneNumber(msg) => ProviderError::InvalidPhoneNumber(msg),
        PhoneVerifyError::CodeRejected(msg) => ProviderError::CodeRejected(msg),
        other => ProviderError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl BaseVerificationProvider for PhoneVerifyAdapter {
    async fn dispatch_code(
        &self,
        phone: &PhoneNumber,
        app_verification_token: Option<&str>,
    ) -> Result<VerificationHandle, ProviderError> {
        let call = self.service.send_code(phone.as_str(), app_verification_token);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => Ok(VerificationHandle::new(response.session_info)),
            Ok(Err(e)) => Err(provider_error(e)),
            Err(_) => {
                warn!(phone = %phone.masked(), "code dispatch timed out");
                Err(ProviderError::Unavailable("code dispatch timed out".to_string()))
            }
        }
    }

    async fn exchange_for_assertion(
        &self,
        handle: &VerificationHandle,
        code: &str,
    ) -> Result<SignedAssertion, ProviderError> {
        let call = self.service.sign_in_with_code(handle.as_str(), code);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => Ok(SignedAssertion::new(response.id_token)),
            Ok(Err(e)) => Err(provider_error(e)),
            Err(_) => Err(ProviderError::Unavailable("code exchange timed out".to_string())),
        }
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to actions (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub identities: Arc<dyn BaseIdentityStore>,
    /// Issues, resolves and revokes bearer sessions
    pub sessions: SessionIssuer,
    pub provider: Arc<dyn BaseVerificationProvider>,
    /// Signature check plus phone match for provider assertions
    pub assertions: AssertionValidator,
    pub normalizer: PhoneNormalizer,
    pub settings: AuthSettings,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    pub fn new(
        identities: Arc<dyn BaseIdentityStore>,
        session_store: Arc<dyn BaseSessionStore>,
        provider: Arc<dyn BaseVerificationProvider>,
        verifier: Arc<dyn BaseAssertionVerifier>,
        settings: AuthSettings,
    ) -> Self {
        let normalizer = PhoneNormalizer::new(settings.default_country_code.clone());
        Self {
            identities,
            sessions: SessionIssuer::new(session_store, settings.session_ttl),
            provider,
            assertions: AssertionValidator::new(verifier, normalizer.clone()),
            normalizer,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_keep_their_meaning() {
        assert!(matches!(
            provider_error(PhoneVerifyError::InvalidPhoneNumber("INVALID_PHONE_NUMBER".into())),
            ProviderError::InvalidPhoneNumber(_)
        ));
        assert!(matches!(
            provider_error(PhoneVerifyError::CodeRejected("INVALID_CODE".into())),
            ProviderError::CodeRejected(_)
        ));
        assert!(matches!(
            provider_error(PhoneVerifyError::Throttled("QUOTA_EXCEEDED".into())),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            provider_error(PhoneVerifyError::Provider {
                status: 500,
                message: "boom".into()
            }),
            ProviderError::Unavailable(_)
        ));
    }
}
