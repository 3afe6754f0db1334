//! `otp login`

use anyhow::Result;
use phone_verify::PhoneVerifyService;
use server_core::domains::auth::models::PhoneNumber;
use server_core::domains::auth::{AuthFlow, DispatchRequest, FlowMode};

use super::flow::{self, Dispatched};
use super::{confirm, offer_retry, prompt_phone, signup, store_session};
use crate::api::{LoginPrecheckReply, LoginVerifyReply, SessionReply};
use crate::context::AppContext;

enum LoginResult {
    Session(SessionReply),
    SignupRequired,
}

pub async fn run(ctx: &AppContext, phone: Option<String>) -> Result<()> {
    ctx.print_header("Log in");
    let phone = prompt_phone(ctx, phone)?;
    let provider = ctx.provider()?;
    let mut auth_flow = AuthFlow::default();

    loop {
        let result = attempt(ctx, &provider, &mut auth_flow, &phone).await;
        if result.is_err() {
            auth_flow.fail();
        }

        match result {
            Ok(LoginResult::Session(session)) => return store_session(ctx, session),
            Ok(LoginResult::SignupRequired) => {
                ctx.print_warning(&format!("No account uses {phone}"));
                if confirm(ctx, "Sign up with this number?", true)? {
                    return signup::run(ctx, Some(phone.to_string())).await;
                }
                return Ok(());
            }
            Err(e) => {
                if offer_retry(ctx, &e)? {
                    continue;
                }
                return Err(e);
            }
        }
    }
}

async fn attempt(
    ctx: &AppContext,
    provider: &PhoneVerifyService,
    auth_flow: &mut AuthFlow,
    phone: &PhoneNumber,
) -> Result<LoginResult> {
    auth_flow.begin(FlowMode::Login, phone.clone())?;

    match ctx.server.login_precheck(phone.as_str()).await? {
        LoginPrecheckReply::Signup { .. } => {
            auth_flow.route_to_signup()?;
            return Ok(LoginResult::SignupRequired);
        }
        LoginPrecheckReply::Login { role_id, .. } => {
            auth_flow.precheck_passed(Some(role_id))?;
            ctx.print_info(&format!("Account found (role {role_id})"));
        }
    }

    let request = DispatchRequest::Login {
        phone: phone.to_string(),
        app_verification_token: ctx.config.app_verification_token.clone(),
    };
    if flow::dispatch(ctx, auth_flow, &request).await? == Dispatched::SignupRequired {
        auth_flow.fail();
        return Ok(LoginResult::SignupRequired);
    }

    let assertion = flow::collect_assertion(ctx, auth_flow, provider, &request).await?;

    match ctx.server.login_verify(&assertion, phone.as_str()).await? {
        LoginVerifyReply::Session(session) => {
            auth_flow.session_issued()?;
            Ok(LoginResult::Session(session))
        }
        LoginVerifyReply::Route { .. } => {
            auth_flow.route_to_signup()?;
            Ok(LoginResult::SignupRequired)
        }
    }
}
