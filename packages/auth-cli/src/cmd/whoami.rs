//! `otp whoami`

use anyhow::Result;

use super::{client_for, print_claims};
use crate::context::AppContext;
use crate::session_file;

pub async fn run(ctx: &AppContext) -> Result<()> {
    let path = &ctx.config.session_file;
    let Some(stored) = session_file::load(path)? else {
        ctx.print_warning("Not logged in");
        return Ok(());
    };

    let server = client_for(ctx, &stored)?;
    match server.session(&stored.session.session_token).await? {
        Some(claims) => {
            ctx.print_success(&format!("Logged in at {}", stored.server_url));
            print_claims(&claims);
        }
        None => {
            session_file::remove(path)?;
            ctx.print_warning("Session expired or revoked; log in again");
        }
    }
    Ok(())
}
