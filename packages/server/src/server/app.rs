//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::ServerDeps;
use crate::server::middleware::session_auth_middleware;
use crate::server::routes::{
    health_handler, login_precheck_handler, login_verify_handler, logout_handler,
    send_code_handler, session_handler, signup_precheck_handler, signup_verify_handler,
};

fn auth_routes() -> Router {
    Router::new()
        .route("/auth/login/precheck", post(login_precheck_handler))
        .route("/auth/signup/precheck", post(signup_precheck_handler))
        .route("/auth/otp/send", post(send_code_handler))
        .route("/auth/login/verify", post(login_verify_handler))
        .route("/auth/signup/verify", post(signup_verify_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/session", get(session_handler))
}

/// Add the layers every deployment shares: session resolution, state and
/// request tracing.
fn with_core_layers(router: Router, deps: ServerDeps) -> Router {
    let sessions = deps.sessions.clone();

    // Middleware layers (applied in reverse order - last added runs first)
    router
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(move |req, next| {
            session_auth_middleware(sessions.clone(), req, next)
        }))
        .layer(Extension(deps))
        .layer(TraceLayer::new_for_http())
}

/// Router without rate limiting or CORS. Needs no peer address, so tests can
/// drive it with `oneshot`.
pub fn build_router(deps: ServerDeps) -> Router {
    with_core_layers(auth_routes(), deps)
}

/// Build the Axum application router
///
/// `/auth/*` is rate limited per client IP: 10 requests per second with
/// bursts up to 20, keyed on X-Forwarded-For / X-Real-IP when present and
/// the peer address otherwise. Serve with `into_make_service_with_connect_info`.
pub fn build_app(deps: ServerDeps, config: &Config) -> Result<Router> {
    let rate_limit_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .use_headers()
            .finish()
            .ok_or_else(|| anyhow!("invalid rate limiter configuration"))?,
    );

    let rate_limited = auth_routes().layer(GovernorLayer {
        config: rate_limit_config,
    });

    Ok(with_core_layers(rate_limited, deps).layer(cors_layer(&config.allowed_origins)?))
}

/// CORS restricted to `allowed_origins`; any origin when the list is empty.
fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid origin {o}")))
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]))
}
