//! Complete login action

use tracing::info;

use crate::domains::auth::errors::AuthFlowError;
use crate::domains::auth::types::{LoginCompletion, SignedAssertion};
use crate::kernel::ServerDeps;

/// Exchange a verified assertion for a session.
///
/// The identity is looked up again by the phone the assertion proved; the
/// role seen at precheck time is never trusted.
pub async fn complete_login(
    assertion: &SignedAssertion,
    claimed_phone: &str,
    deps: &ServerDeps,
) -> Result<LoginCompletion, AuthFlowError> {
    let phone = deps
        .assertions
        .validate(assertion, claimed_phone)
        .await
        .into_result()?;

    let Some(record) = deps.identities.find_by_phone(&phone).await? else {
        info!(phone = %phone.masked(), "verified phone has no account, routing to signup");
        return Ok(LoginCompletion::SignupRequired { phone });
    };

    let session = deps.sessions.issue(&record).await?;
    info!(user_id = %record.id, "login completed");
    Ok(LoginCompletion::SessionIssued(session))
}
