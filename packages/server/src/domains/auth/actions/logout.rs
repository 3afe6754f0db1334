//! Logout action

use tracing::info;

use crate::domains::auth::errors::AuthFlowError;
use crate::kernel::ServerDeps;

/// Revoke a bearer token. Unknown tokens are not an error.
pub async fn logout(token: &str, deps: &ServerDeps) -> Result<(), AuthFlowError> {
    if deps.sessions.revoke(token).await? {
        info!("session revoked");
    }
    Ok(())
}
