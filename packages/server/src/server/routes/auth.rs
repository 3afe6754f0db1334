//! `/auth/*` handlers.
//!
//! Thin JSON wrappers around the auth actions. Every cross-step value
//! (verification handle, profile draft) travels with the client.

use axum::{extract::Extension, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::Actor;
use crate::domains::auth::actions;
use crate::domains::auth::models::{PhoneNumber, RoleId};
use crate::domains::auth::{
    DispatchOutcome, DispatchRequest, FlowMode, IssuedSession, LoginCompletion, LoginPrecheck,
    SessionClaims, SignedAssertion, SignupDraft, SignupPrecheck, VerificationHandle,
};
use crate::kernel::ServerDeps;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

// =============================================================================
// Request / response bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupPrecheckRequest {
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum LoginPrecheckResponse {
    Login { phone: PhoneNumber, role_id: RoleId },
    Signup { phone: PhoneNumber },
}

impl From<LoginPrecheck> for LoginPrecheckResponse {
    fn from(precheck: LoginPrecheck) -> Self {
        match precheck {
            LoginPrecheck::Login { phone, role_id } => Self::Login { phone, role_id },
            LoginPrecheck::Signup { phone } => Self::Signup { phone },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub mode: FlowMode,
    pub sent: bool,
    pub phone: PhoneNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_handle: Option<VerificationHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resend_after_secs: Option<u64>,
}

impl From<DispatchOutcome> for DispatchResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Sent {
                mode,
                phone,
                handle,
                resend_after,
            } => Self {
                mode,
                sent: true,
                phone,
                verification_handle: Some(handle),
                resend_after_secs: Some(resend_after.as_secs()),
            },
            DispatchOutcome::SignupRequired { phone } => Self {
                mode: FlowMode::Signup,
                sent: false,
                phone,
                verification_handle: None,
                resend_after_secs: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginVerifyRequest {
    pub signed_assertion: SignedAssertion,
    pub claimed_phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupVerifyRequest {
    pub signed_assertion: SignedAssertion,
    pub profile: SignupDraft,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_token: String,
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedSession> for SessionResponse {
    fn from(session: IssuedSession) -> Self {
        Self {
            session_token: session.session_token,
            claims: session.claims,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginVerifyResponse {
    Session(SessionResponse),
    Route { mode: FlowMode, phone: PhoneNumber },
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn login_precheck_handler(
    Extension(deps): Extension<ServerDeps>,
    Json(body): Json<PhoneRequest>,
) -> Result<Json<LoginPrecheckResponse>, ApiError> {
    let precheck = actions::login_precheck(&body.phone, &deps).await?;
    Ok(Json(precheck.into()))
}

pub async fn signup_precheck_handler(
    Extension(deps): Extension<ServerDeps>,
    Json(body): Json<SignupPrecheckRequest>,
) -> Result<Json<SignupPrecheck>, ApiError> {
    let precheck = actions::signup_precheck(&body.phone, body.email.as_deref(), &deps).await?;
    Ok(Json(precheck))
}

pub async fn send_code_handler(
    Extension(deps): Extension<ServerDeps>,
    Json(body): Json<DispatchRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let outcome = actions::dispatch_code(body, &deps).await?;
    Ok(Json(outcome.into()))
}

pub async fn login_verify_handler(
    Extension(deps): Extension<ServerDeps>,
    Json(body): Json<LoginVerifyRequest>,
) -> Result<Json<LoginVerifyResponse>, ApiError> {
    let completion =
        actions::complete_login(&body.signed_assertion, &body.claimed_phone, &deps).await?;

    Ok(Json(match completion {
        LoginCompletion::SessionIssued(session) => LoginVerifyResponse::Session(session.into()),
        LoginCompletion::SignupRequired { phone } => LoginVerifyResponse::Route {
            mode: FlowMode::Signup,
            phone,
        },
    }))
}

pub async fn signup_verify_handler(
    Extension(deps): Extension<ServerDeps>,
    Json(body): Json<SignupVerifyRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = actions::complete_signup(&body.signed_assertion, body.profile, &deps).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

pub async fn logout_handler(
    Extension(deps): Extension<ServerDeps>,
    user: Option<Extension<AuthUser>>,
) -> Result<StatusCode, ApiError> {
    let Some(Extension(user)) = user else {
        return Err(crate::common::AuthError::AuthenticationRequired.into());
    };
    actions::logout(&user.token, &deps).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn session_handler(
    user: Option<Extension<AuthUser>>,
) -> Result<Json<SessionClaims>, ApiError> {
    let user = user.map(|Extension(user)| user);
    let actor = Actor::require(user.as_ref().map(|u| &u.claims))?;
    Ok(Json(actor.claims().clone()))
}
