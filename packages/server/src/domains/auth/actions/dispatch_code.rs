//! Dispatch code action

use tracing::{info, warn};

use super::{parse_email, parse_phone};
use crate::domains::auth::errors::AuthFlowError;
use crate::domains::auth::lookup;
use crate::domains::auth::types::{DispatchOutcome, DispatchRequest, FlowMode, LoginPrecheck};
use crate::kernel::{ProviderError, ServerDeps};

/// Send a one-time code, but only after the precheck for the request's
/// purpose passed. Login for an unknown phone and signup for a taken phone
/// never spend provider quota.
pub async fn dispatch_code(
    request: DispatchRequest,
    deps: &ServerDeps,
) -> Result<DispatchOutcome, AuthFlowError> {
    let (phone, app_verification_token) = match &request {
        DispatchRequest::Login {
            phone,
            app_verification_token,
        } => {
            let phone = parse_phone(phone, deps)?;
            if let LoginPrecheck::Signup { phone } =
                lookup::login_precheck(deps.identities.as_ref(), &phone).await?
            {
                info!(phone = %phone.masked(), "code not sent: phone not registered");
                return Ok(DispatchOutcome::SignupRequired { phone });
            }
            (phone, app_verification_token.as_deref())
        }
        DispatchRequest::Signup {
            phone,
            email,
            app_verification_token,
        } => {
            let phone = parse_phone(phone, deps)?;
            let email = parse_email(email.as_deref())?;
            if let Some(reason) =
                lookup::resolve(deps.identities.as_ref(), &phone, email.as_deref()).await?
            {
                info!(phone = %phone.masked(), reason = reason.subject(), "code not sent: already registered");
                return Err(AuthFlowError::Conflict(reason));
            }
            (phone, app_verification_token.as_deref())
        }
    };

    let handle = deps
        .provider
        .dispatch_code(&phone, app_verification_token)
        .await
        .map_err(|e| {
            warn!(phone = %phone.masked(), error = %e, "code dispatch failed");
            match e {
                ProviderError::InvalidPhoneNumber(msg) => AuthFlowError::InvalidPhoneNumber(msg),
                ProviderError::Unavailable(msg) | ProviderError::CodeRejected(msg) => {
                    AuthFlowError::ProviderUnavailable(msg)
                }
            }
        })?;

    let mode: FlowMode = request.mode();
    info!(phone = %phone.masked(), ?mode, "verification code sent");

    Ok(DispatchOutcome::Sent {
        mode,
        phone,
        handle,
        resend_after: deps.settings.resend_cooldown,
    })
}
