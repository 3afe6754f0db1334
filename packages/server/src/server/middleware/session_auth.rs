use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::domains::auth::{SessionClaims, SessionIssuer};

/// Authenticated user information from the session registry
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub claims: SessionClaims,
    /// Raw bearer token, kept so the session can be revoked on logout
    pub token: String,
}

/// Session authentication middleware
///
/// Extracts the bearer token from the Authorization header, resolves it
/// against the session registry and adds AuthUser to request extensions.
/// If no token or an unknown/expired token, the request continues without
/// AuthUser (public access). Handlers decide whether that is acceptable.
pub async fn session_auth_middleware(
    sessions: SessionIssuer,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match sessions.resolve(&token).await {
            Ok(Some(claims)) => {
                debug!(user_id = %claims.user_id, role = %claims.role_id, "Authenticated session");
                request.extensions_mut().insert(AuthUser { claims, token });
            }
            Ok(None) => debug!("Unknown or expired session token"),
            Err(e) => warn!(error = %e, "Session lookup failed"),
        }
    }

    next.run(request).await
}

/// Token from `Authorization` (handles both "Bearer <token>" and raw token).
/// The scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    let token = match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => &value[7..],
        _ => value,
    }
    .trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_token_with_bearer() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123".to_string()));
    }

    #[test]
    fn test_bearer_scheme_ignores_case() {
        for value in ["bearer abc123", "BEARER abc123", "bEaReR   abc123"] {
            assert_eq!(bearer_token(&headers(value)), Some("abc123".to_string()), "{value}");
        }
    }

    #[test]
    fn test_extract_token_without_bearer() {
        assert_eq!(bearer_token(&headers("abc123")), Some("abc123".to_string()));
    }

    #[test]
    fn test_no_auth_header() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_empty_token() {
        assert_eq!(bearer_token(&headers("Bearer ")), None);
    }
}
