// Infrastructure traits for the identity flow
//
// Every external system the auth flow touches sits behind one of these
// traits so that tests can swap in the implementations from
// `test_dependencies`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domains::auth::models::{IdentityRecord, NewIdentity, PhoneNumber};
use crate::domains::auth::{
    ExistenceReason, SessionEntry, SignedAssertion, VerificationHandle,
};

// =============================================================================
// Identity Store Trait (Persistence)
// =============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique phone or email constraint rejected the write.
    #[error("duplicate identity: {0:?}")]
    Duplicate(ExistenceReason),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait BaseIdentityStore: Send + Sync {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<IdentityRecord>, StoreError>;

    /// Case-insensitive match on the stored email.
    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError>;

    /// Create the record unless its phone (or email) is already taken. Under
    /// concurrent calls for the same phone exactly one succeeds; the others
    /// get `StoreError::Duplicate`.
    async fn insert_if_phone_unique(&self, identity: NewIdentity)
        -> Result<IdentityRecord, StoreError>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}

// =============================================================================
// Session Registry Trait (Persistence)
// =============================================================================

#[async_trait]
pub trait BaseSessionStore: Send + Sync {
    async fn insert(&self, token_hash: &str, entry: &SessionEntry) -> Result<(), StoreError>;

    /// Returns the entry whether or not it has expired.
    async fn get(&self, token_hash: &str) -> Result<Option<SessionEntry>, StoreError>;

    /// Returns whether an entry was removed.
    async fn delete(&self, token_hash: &str) -> Result<bool, StoreError>;

    /// Remove every entry that expired at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

// =============================================================================
// Verification Provider Trait (Infrastructure - SMS/OTP)
// =============================================================================

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("code rejected: {0}")]
    CodeRejected(String),
}

/// Third-party phone verification.
///
/// Dispatch consumes provider quota and is never retried here. A new dispatch
/// for the same phone implicitly invalidates the previous handle; that is the
/// provider's job, not ours.
#[async_trait]
pub trait BaseVerificationProvider: Send + Sync {
    async fn dispatch_code(
        &self,
        phone: &PhoneNumber,
        app_verification_token: Option<&str>,
    ) -> Result<VerificationHandle, ProviderError>;

    /// Client-side exchange of handle + code for a signed assertion. The
    /// server never calls this; it only receives the resulting assertion.
    async fn exchange_for_assertion(
        &self,
        handle: &VerificationHandle,
        code: &str,
    ) -> Result<SignedAssertion, ProviderError>;
}

// =============================================================================
// Assertion Verifier Trait (Infrastructure - signatures)
// =============================================================================

/// Claims read from an assertion whose signature and freshness checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertedPhone {
    /// Phone exactly as the provider wrote it.
    pub phone: String,
    /// Provider-side subject of the assertion.
    pub subject: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyFailure {
    /// Bad signature, wrong issuer/audience, expired, or missing claims.
    #[error("assertion rejected: {0}")]
    Invalid(String),

    /// The verifier itself cannot work (no keys, unreachable key endpoint).
    #[error("verifier misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait BaseAssertionVerifier: Send + Sync {
    async fn verify(&self, assertion: &SignedAssertion) -> Result<AssertedPhone, VerifyFailure>;
}
