use thiserror::Error;

use super::types::ExistenceReason;
use crate::kernel::StoreError;

/// Failures of an auth attempt. Every one of them ends the attempt; the
/// client restarts from code dispatch.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// Rejected locally, the provider was never contacted.
    #[error("invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("verification provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("assertion is invalid or expired")]
    InvalidOrExpiredAssertion,

    #[error("asserted phone does not match the claimed phone")]
    PhoneMismatch,

    #[error("{} already registered", .0.subject())]
    Conflict(ExistenceReason),

    #[error("server misconfiguration: {0}")]
    ServerMisconfiguration(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthFlowError {
    /// Whether this failure must look like a generic verification failure to
    /// the end user.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidOrExpiredAssertion | Self::PhoneMismatch | Self::ServerMisconfiguration(_)
        )
    }

    /// Message safe to show to end users.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidPhoneNumber(_) => "Invalid phone number".to_string(),
            Self::InvalidProfile(detail) => detail.clone(),
            Self::ProviderUnavailable(_) => {
                "Verification service unavailable, please try again later".to_string()
            }
            Self::InvalidOrExpiredAssertion
            | Self::PhoneMismatch
            | Self::ServerMisconfiguration(_) => "Verification failed".to_string(),
            Self::Conflict(reason) => reason.message().to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<StoreError> for AuthFlowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(reason) => Self::Conflict(reason),
            StoreError::Database(e) => Self::Internal(e.into()),
        }
    }
}
