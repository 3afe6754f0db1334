//! Subcommands.

pub mod flow;
pub mod login;
pub mod logout;
pub mod signup;
pub mod whoami;

use anyhow::{bail, Result};
use console::style;
use dialoguer::{Confirm, Input};
use server_core::domains::auth::models::PhoneNumber;
use server_core::domains::auth::SessionClaims;

use crate::api::{ServerClient, SessionReply};
use crate::context::AppContext;
use crate::session_file::{self, StoredSession};

/// Normalized phone from `given` or a prompt. Implausible numbers are
/// refused before anything is sent.
pub fn prompt_phone(ctx: &AppContext, given: Option<String>) -> Result<PhoneNumber> {
    let raw = match given {
        Some(raw) => raw,
        None => Input::<String>::with_theme(&ctx.theme())
            .with_prompt("Phone number")
            .interact_text()?,
    };

    let phone = ctx.normalizer.normalize(&raw)?;
    if !phone.is_plausible() {
        bail!("{} is not a valid phone number", raw.trim());
    }
    Ok(phone)
}

pub fn confirm(ctx: &AppContext, prompt: &str, default: bool) -> Result<bool> {
    if ctx.quiet {
        return Ok(default);
    }
    Ok(Confirm::with_theme(&ctx.theme())
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

/// Offer a fresh attempt after `err` when a new code could help.
pub fn offer_retry(ctx: &AppContext, err: &anyhow::Error) -> Result<bool> {
    if !flow::is_retryable(err) {
        return Ok(false);
    }
    ctx.print_warning(&format!("{err:#}"));
    confirm(ctx, "Send a new code?", true)
}

pub fn store_session(ctx: &AppContext, session: SessionReply) -> Result<()> {
    let stored = StoredSession {
        server_url: ctx.config.server_url.clone(),
        session,
    };
    session_file::save(&ctx.config.session_file, &stored)?;
    ctx.print_success(&format!(
        "Session saved to {}",
        ctx.config.session_file.display()
    ));
    print_claims(&stored.session.claims);
    println!(
        "  {:<12} {}",
        style("expires").dim(),
        stored.session.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

/// Client for the server that issued `stored`.
pub fn client_for(ctx: &AppContext, stored: &StoredSession) -> Result<ServerClient> {
    if stored.server_url == ctx.config.server_url {
        Ok(ctx.server.clone())
    } else {
        ServerClient::new(&stored.server_url)
    }
}

pub fn print_claims(claims: &SessionClaims) {
    println!("  {:<12} {}", style("user").dim(), claims.user_id);
    println!("  {:<12} {}", style("phone").dim(), claims.phone);
    println!("  {:<12} {}", style("role").dim(), style(claims.role_id).bold());
    if let Some(org_id) = claims.org_id {
        println!("  {:<12} {}", style("org").dim(), org_id);
    }
    println!(
        "  {:<12} {}",
        style("permissions").dim(),
        claims.permissions.join(", ")
    );
}
