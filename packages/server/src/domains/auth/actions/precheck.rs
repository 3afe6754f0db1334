//! Precheck actions

use tracing::info;

use super::{parse_email, parse_phone};
use crate::domains::auth::errors::AuthFlowError;
use crate::domains::auth::lookup;
use crate::domains::auth::types::{LoginPrecheck, SignupPrecheck};
use crate::kernel::ServerDeps;

/// Does `raw_phone` belong to an account? An unknown phone is a routing
/// decision (`LoginPrecheck::Signup`), not an error.
pub async fn login_precheck(
    raw_phone: &str,
    deps: &ServerDeps,
) -> Result<LoginPrecheck, AuthFlowError> {
    let phone = parse_phone(raw_phone, deps)?;
    let result = lookup::login_precheck(deps.identities.as_ref(), &phone).await?;

    if let LoginPrecheck::Signup { .. } = result {
        info!(phone = %phone.masked(), "login precheck: no account, routing to signup");
    }
    Ok(result)
}

/// Are phone or email already taken?
pub async fn signup_precheck(
    raw_phone: &str,
    email: Option<&str>,
    deps: &ServerDeps,
) -> Result<SignupPrecheck, AuthFlowError> {
    let phone = parse_phone(raw_phone, deps)?;
    let email = parse_email(email)?;
    Ok(lookup::signup_precheck(deps.identities.as_ref(), &phone, email.as_deref()).await?)
}
