//! Complete signup action

use tracing::{info, warn};

use super::{parse_email, validate_profile};
use crate::domains::auth::errors::AuthFlowError;
use crate::domains::auth::models::NewIdentity;
use crate::domains::auth::session::IssuedSession;
use crate::domains::auth::types::{SignedAssertion, SignupDraft};
use crate::kernel::{ServerDeps, StoreError};

/// Create the identity for `draft` once its phone is proven, then open a
/// session for it.
///
/// This is the only place identity records are created. The store's unique
/// constraints decide races; the loser gets `Conflict` and must restart.
pub async fn complete_signup(
    assertion: &SignedAssertion,
    draft: SignupDraft,
    deps: &ServerDeps,
) -> Result<IssuedSession, AuthFlowError> {
    validate_profile(&draft)?;

    let phone = deps
        .assertions
        .validate(assertion, &draft.phone)
        .await
        .into_result()?;

    let identity = NewIdentity {
        phone,
        email: parse_email(draft.email.as_deref())?,
        name: draft.name.trim().to_string(),
        role_id: draft.role_id,
        org_id: draft.org_id,
        permissions: draft.role_id.default_permissions(),
    };

    let record = match deps.identities.insert_if_phone_unique(identity).await {
        Ok(record) => record,
        Err(StoreError::Duplicate(reason)) => {
            warn!(reason = reason.subject(), "signup lost to an existing identity");
            return Err(AuthFlowError::Conflict(reason));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %record.id, role = %record.role_id, "identity created");
    Ok(deps.sessions.issue(&record).await?)
}
