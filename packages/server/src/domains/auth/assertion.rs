//! Assertion validation: the single trust boundary of the auth flow.
//!
//! A signed assertion proves that *some* phone was verified. The validator
//! checks that it is genuine and fresh, then that the phone it names is the
//! phone the caller claims. A valid assertion for phone A must never unlock
//! phone B.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, warn};

use super::errors::AuthFlowError;
use super::models::{PhoneNormalizer, PhoneNumber};
use super::types::SignedAssertion;
use crate::kernel::{BaseAssertionVerifier, VerifyFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidOrExpired,
    PhoneMismatch,
    ServerMisconfiguration,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidOrExpired => "invalid_or_expired",
            Self::PhoneMismatch => "phone_mismatch",
            Self::ServerMisconfiguration => "server_misconfiguration",
        }
    }
}

/// Result of validating an assertion. Validation never fails outright; a
/// broken verifier shows up as `ServerMisconfiguration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionOutcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<PhoneNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl AssertionOutcome {
    fn accepted(phone: PhoneNumber) -> Self {
        Self {
            valid: true,
            phone: Some(phone),
            reason: None,
        }
    }

    fn rejected(reason: RejectReason) -> Self {
        Self {
            valid: false,
            phone: None,
            reason: Some(reason),
        }
    }

    /// The trusted phone, or the flow error the rejection maps to.
    pub fn into_result(self) -> Result<PhoneNumber, AuthFlowError> {
        match (self.phone, self.reason) {
            (Some(phone), None) if self.valid => Ok(phone),
            (_, Some(RejectReason::PhoneMismatch)) => Err(AuthFlowError::PhoneMismatch),
            (_, Some(RejectReason::ServerMisconfiguration)) => Err(
                AuthFlowError::ServerMisconfiguration("assertion verifier unavailable".to_string()),
            ),
            _ => Err(AuthFlowError::InvalidOrExpiredAssertion),
        }
    }
}

#[derive(Clone)]
pub struct AssertionValidator {
    verifier: Arc<dyn BaseAssertionVerifier>,
    normalizer: PhoneNormalizer,
}

impl AssertionValidator {
    pub fn new(verifier: Arc<dyn BaseAssertionVerifier>, normalizer: PhoneNormalizer) -> Self {
        Self {
            verifier,
            normalizer,
        }
    }

    pub async fn validate(&self, assertion: &SignedAssertion, claimed_phone: &str) -> AssertionOutcome {
        let asserted = match self.verifier.verify(assertion).await {
            Ok(asserted) => asserted,
            Err(VerifyFailure::Invalid(detail)) => {
                warn!(detail = %detail, "assertion rejected");
                return AssertionOutcome::rejected(RejectReason::InvalidOrExpired);
            }
            Err(VerifyFailure::Misconfigured(detail)) => {
                error!(
                    event = "server_misconfiguration",
                    detail = %detail,
                    "assertion verifier unavailable"
                );
                return AssertionOutcome::rejected(RejectReason::ServerMisconfiguration);
            }
        };

        let compact: String = asserted.phone.chars().filter(|c| !c.is_whitespace()).collect();
        let Ok(asserted_phone) = self.normalizer.normalize(&compact) else {
            warn!(subject = %asserted.subject, "assertion carries an unusable phone");
            return AssertionOutcome::rejected(RejectReason::InvalidOrExpired);
        };

        // An unparseable claim can never equal a real phone.
        let claimed = self.normalizer.normalize(claimed_phone).ok();
        if claimed.as_ref() != Some(&asserted_phone) {
            warn!(
                event = "phone_mismatch",
                asserted = %asserted_phone.masked(),
                claimed = %claimed.as_ref().map(PhoneNumber::masked).unwrap_or_default(),
                subject = %asserted.subject,
                "asserted phone does not match claimed phone"
            );
            return AssertionOutcome::rejected(RejectReason::PhoneMismatch);
        }

        AssertionOutcome::accepted(asserted_phone)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::kernel::test_dependencies::{mint_assertion, mint_assertion_with, HmacAssertionVerifier};
    use crate::kernel::AssertedPhone;

    fn validator() -> AssertionValidator {
        AssertionValidator::new(
            Arc::new(HmacAssertionVerifier::default()),
            PhoneNormalizer::default(),
        )
    }

    struct BrokenVerifier;

    #[async_trait]
    impl BaseAssertionVerifier for BrokenVerifier {
        async fn verify(&self, _: &SignedAssertion) -> Result<AssertedPhone, VerifyFailure> {
            Err(VerifyFailure::Misconfigured("no signing keys".to_string()))
        }
    }

    #[tokio::test]
    async fn accepts_matching_phone_in_any_shape() {
        let validator = validator();
        let assertion = mint_assertion("+91 98765 43210");

        for claimed in ["9876543210", "+919876543210", "919876543210", "98765-43210"] {
            let outcome = validator.validate(&assertion, claimed).await;
            assert!(outcome.valid, "claimed {claimed}");
            assert_eq!(outcome.phone.unwrap().as_str(), "+919876543210");
        }
    }

    #[tokio::test]
    async fn rejects_assertion_for_another_phone() {
        let outcome = validator()
            .validate(&mint_assertion("+919876543210"), "9876543211")
            .await;

        assert!(!outcome.valid);
        assert_eq!(outcome.reason, Some(RejectReason::PhoneMismatch));
        assert!(outcome.phone.is_none());
        assert!(matches!(outcome.into_result(), Err(AuthFlowError::PhoneMismatch)));
    }

    #[tokio::test]
    async fn mismatch_holds_for_many_pairs() {
        let validator = validator();
        let pairs = [
            ("+919876543210", "+919876543219"),
            ("+14155550100", "4155550100"),
            ("+447700900123", "+447700900124"),
            ("+919876543210", "not a phone"),
            ("+919876543210", ""),
        ];
        for (asserted, claimed) in pairs {
            let outcome = validator.validate(&mint_assertion(asserted), claimed).await;
            assert!(!outcome.valid, "{asserted} vs {claimed}");
            assert_eq!(outcome.reason, Some(RejectReason::PhoneMismatch));
        }
    }

    #[tokio::test]
    async fn rejects_expired_assertion() {
        let now = chrono::Utc::now().timestamp();
        let assertion = mint_assertion_with(serde_json::json!({
            "phone_number": "+919876543210",
            "iat": now - 7200,
            "auth_time": now - 7200,
            "exp": now - 3600,
        }));

        let outcome = validator().validate(&assertion, "9876543210").await;
        assert_eq!(outcome.reason, Some(RejectReason::InvalidOrExpired));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let outcome = validator()
            .validate(&SignedAssertion::new("not-a-jwt"), "9876543210")
            .await;
        assert_eq!(outcome.reason, Some(RejectReason::InvalidOrExpired));
    }

    #[tokio::test]
    async fn broken_verifier_degrades_to_misconfiguration() {
        let validator = AssertionValidator::new(Arc::new(BrokenVerifier), PhoneNormalizer::default());
        let outcome = validator
            .validate(&mint_assertion("+919876543210"), "9876543210")
            .await;

        assert!(!outcome.valid);
        assert_eq!(outcome.reason, Some(RejectReason::ServerMisconfiguration));
        assert!(matches!(
            outcome.into_result(),
            Err(AuthFlowError::ServerMisconfiguration(_))
        ));
    }

    #[test]
    fn reasons_serialize_in_snake_case() {
        assert_eq!(
            serde_json::to_value(RejectReason::InvalidOrExpired).unwrap(),
            "invalid_or_expired"
        );
        assert_eq!(RejectReason::PhoneMismatch.as_str(), "phone_mismatch");
    }
}
