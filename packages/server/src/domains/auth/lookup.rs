//! Identity lookup for the two prechecks.
//!
//! Results carry a boolean and a reason at most. Names and contact details of
//! the matched account never leave this module.

use super::models::{normalize_email, PhoneNumber};
use super::types::{ExistenceReason, LoginPrecheck, SignupPrecheck};
use crate::kernel::{BaseIdentityStore, StoreError};

/// Login precheck: does this phone belong to an account?
pub async fn login_precheck(
    store: &dyn BaseIdentityStore,
    phone: &PhoneNumber,
) -> Result<LoginPrecheck, StoreError> {
    Ok(match store.find_by_phone(phone).await? {
        Some(record) => LoginPrecheck::Login {
            phone: phone.clone(),
            role_id: record.role_id,
        },
        None => LoginPrecheck::Signup {
            phone: phone.clone(),
        },
    })
}

/// Which of phone and email are already registered. Email is only ever
/// consulted here, never for login.
pub async fn resolve(
    store: &dyn BaseIdentityStore,
    phone: &PhoneNumber,
    email: Option<&str>,
) -> Result<Option<ExistenceReason>, StoreError> {
    let phone_taken = store.find_by_phone(phone).await?.is_some();

    let email = email.map(normalize_email).filter(|e| !e.is_empty());
    let email_taken = match email {
        Some(email) => store.find_by_email(&email).await?.is_some(),
        None => false,
    };

    Ok(ExistenceReason::from_matches(phone_taken, email_taken))
}

/// Signup precheck on phone and, when given, email.
pub async fn signup_precheck(
    store: &dyn BaseIdentityStore,
    phone: &PhoneNumber,
    email: Option<&str>,
) -> Result<SignupPrecheck, StoreError> {
    Ok(SignupPrecheck::from_reason(resolve(store, phone, email).await?))
}
