//! `otp signup`

use anyhow::{bail, Result};
use dialoguer::{Input, Select};
use phone_verify::PhoneVerifyService;
use server_core::common::OrgId;
use server_core::domains::auth::models::{PhoneNumber, RoleId};
use server_core::domains::auth::{AuthFlow, DispatchRequest, FlowMode, SignupDraft};

use super::flow::{self, Dispatched};
use super::{offer_retry, prompt_phone, store_session};
use crate::api::SessionReply;
use crate::context::AppContext;

/// Display name for roles offered at signup.
pub fn role_label(role_id: RoleId) -> &'static str {
    match role_id {
        RoleId::Admin => "Administrator",
        RoleId::ProgramCoordinator => "Program coordinator",
        RoleId::OrgManager => "Organization manager",
        RoleId::Developer => "Developer",
        RoleId::Mentor => "Mentor",
    }
}

pub fn selectable_roles() -> Vec<RoleId> {
    RoleId::ALL
        .into_iter()
        .filter(RoleId::is_self_service)
        .collect()
}

pub async fn run(ctx: &AppContext, phone: Option<String>) -> Result<()> {
    ctx.print_header("Sign up");
    let phone = prompt_phone(ctx, phone)?;
    let draft = prompt_profile(ctx, &phone)?;
    let provider = ctx.provider()?;
    let mut auth_flow = AuthFlow::default();

    loop {
        let result = attempt(ctx, &provider, &mut auth_flow, &phone, &draft).await;
        match result {
            Ok(session) => return store_session(ctx, session),
            Err(e) => {
                auth_flow.fail();
                if offer_retry(ctx, &e)? {
                    continue;
                }
                return Err(e);
            }
        }
    }
}

fn prompt_profile(ctx: &AppContext, phone: &PhoneNumber) -> Result<SignupDraft> {
    let theme = ctx.theme();

    let name: String = Input::with_theme(&theme)
        .with_prompt("Full name")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Name is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let email: String = Input::with_theme(&theme)
        .with_prompt("Email (optional)")
        .allow_empty(true)
        .interact_text()?;

    let roles = selectable_roles();
    let labels: Vec<&str> = roles.iter().map(|r| role_label(*r)).collect();
    let selection = Select::with_theme(&theme)
        .with_prompt("Role")
        .items(&labels)
        .default(0)
        .interact()?;
    let role_id = roles[selection];

    let org_id = if role_id.requires_org() {
        let raw: String = Input::with_theme(&theme)
            .with_prompt("Organization ID")
            .validate_with(|input: &String| -> Result<(), &str> {
                OrgId::parse(input.trim())
                    .map(|_| ())
                    .map_err(|_| "Not a valid organization ID")
            })
            .interact_text()?;
        Some(OrgId::parse(raw.trim())?)
    } else {
        None
    };

    Ok(SignupDraft {
        name: name.trim().to_string(),
        phone: phone.to_string(),
        email: Some(email.trim().to_string()).filter(|e| !e.is_empty()),
        role_id,
        org_id,
    })
}

async fn attempt(
    ctx: &AppContext,
    provider: &PhoneVerifyService,
    auth_flow: &mut AuthFlow,
    phone: &PhoneNumber,
    draft: &SignupDraft,
) -> Result<SessionReply> {
    auth_flow.begin(FlowMode::Signup, phone.clone())?;

    let precheck = ctx
        .server
        .signup_precheck(phone.as_str(), draft.email.as_deref())
        .await?;
    if precheck.exists {
        bail!("{}", precheck.message);
    }
    auth_flow.precheck_passed(None)?;

    let request = DispatchRequest::Signup {
        phone: phone.to_string(),
        email: draft.email.clone(),
        app_verification_token: ctx.config.app_verification_token.clone(),
    };
    if flow::dispatch(ctx, auth_flow, &request).await? == Dispatched::SignupRequired {
        bail!("Server refused to send a signup code");
    }

    let assertion = flow::collect_assertion(ctx, auth_flow, provider, &request).await?;
    let session = ctx.server.signup_verify(&assertion, draft).await?;
    auth_flow.session_issued()?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_not_offered() {
        let roles = selectable_roles();
        assert!(!roles.contains(&RoleId::Admin));
        assert_eq!(roles.len(), RoleId::ALL.len() - 1);
        assert_eq!(role_label(RoleId::OrgManager), "Organization manager");
    }
}
