//! Client half of the verification flow: code dispatch with cooldown, code
//! entry and the provider exchange. Every step goes through `AuthFlow` so
//! steps cannot be skipped or replayed.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dialoguer::Input;
use phone_verify::{PhoneVerifyError, PhoneVerifyService};
use server_core::domains::auth::{AuthFlow, DispatchRequest, FlowError, SignedAssertion};

use crate::api::ApiFailure;
use crate::context::AppContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeEntry {
    Code(String),
    Resend,
}

/// `r`/`resend` asks for a new code; otherwise exactly six digits, spaces
/// ignored.
pub fn parse_code_entry(input: &str) -> Option<CodeEntry> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("r") || trimmed.eq_ignore_ascii_case("resend") {
        return Some(CodeEntry::Resend);
    }

    let code: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    (code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())).then_some(CodeEntry::Code(code))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Sent,
    /// The server found no account for a login; nothing was sent.
    SignupRequired,
}

/// Ask the server to send a code, waiting out the resend cooldown first.
pub async fn dispatch(
    ctx: &AppContext,
    flow: &mut AuthFlow,
    request: &DispatchRequest,
) -> Result<Dispatched> {
    loop {
        match flow.ensure_can_dispatch(Instant::now()) {
            Ok(()) => break,
            Err(FlowError::CooldownActive { remaining }) => {
                ctx.print_info(&format!(
                    "Waiting {}s before sending another code...",
                    remaining.as_secs().max(1)
                ));
                tokio::time::sleep(remaining).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let reply = ctx.server.send_code(request).await?;
    if !reply.sent {
        return Ok(Dispatched::SignupRequired);
    }

    let handle = reply
        .verification_handle
        .context("Server reported a sent code without a verification handle")?;
    let resend_after = Duration::from_secs(reply.resend_after_secs.unwrap_or_default());
    flow.code_dispatched(handle, resend_after, Instant::now())?;

    ctx.print_success(&format!("Code sent to {}", reply.phone.masked()));
    Ok(Dispatched::Sent)
}

/// Read the code and trade it with the provider for a signed assertion.
///
/// The handle is consumed by the exchange; a rejected code fails the flow and
/// a fresh dispatch is needed.
pub async fn collect_assertion(
    ctx: &AppContext,
    flow: &mut AuthFlow,
    provider: &PhoneVerifyService,
    request: &DispatchRequest,
) -> Result<SignedAssertion> {
    loop {
        let input: String = Input::with_theme(&ctx.theme())
            .with_prompt("Enter the 6-digit code (r to resend)")
            .interact_text()?;

        let code = match parse_code_entry(&input) {
            Some(CodeEntry::Code(code)) => code,
            Some(CodeEntry::Resend) => {
                if dispatch(ctx, flow, request).await? == Dispatched::SignupRequired {
                    anyhow::bail!("The server no longer has an account for this number");
                }
                continue;
            }
            None => {
                ctx.print_warning("Codes are 6 digits");
                continue;
            }
        };

        let handle = flow.assertion_submitted()?;
        let reply = provider
            .sign_in_with_code(handle.as_str(), &code)
            .await
            .context("Code rejected")?;
        return Ok(SignedAssertion::new(reply.id_token));
    }
}

/// Whether starting over with a new code can fix `err`.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(failure) = err.downcast_ref::<ApiFailure>() {
        return failure.is_verification_failure();
    }
    matches!(
        err.downcast_ref::<PhoneVerifyError>(),
        Some(PhoneVerifyError::CodeRejected(_))
    )
}
