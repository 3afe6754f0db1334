//! `otp logout`

use anyhow::Result;

use super::client_for;
use crate::context::AppContext;
use crate::session_file;

pub async fn run(ctx: &AppContext) -> Result<()> {
    let path = &ctx.config.session_file;
    let Some(stored) = session_file::load(path)? else {
        ctx.print_warning("Not logged in");
        return Ok(());
    };

    client_for(ctx, &stored)?
        .logout(&stored.session.session_token)
        .await?;
    session_file::remove(path)?;
    ctx.print_success("Logged out");
    Ok(())
}
