//! Phone OTP Identity Server
//!
//! Serves the `/auth/*` JSON API. Runs on Postgres when DATABASE_URL is set,
//! otherwise on in-memory stores (development only: nothing survives a
//! restart).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use phone_verify::{PhoneVerifyOptions, PhoneVerifyService};
use server_core::kernel::scheduled_tasks::start_scheduler;
use server_core::kernel::{
    AssertionRules, BaseIdentityStore, BaseSessionStore, JwksAssertionVerifier,
    MemoryIdentityStore, MemorySessionStore, PgIdentityStore, PgSessionStore, PhoneVerifyAdapter,
    ServerDeps,
};
use server_core::server::build_app;
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting Phone OTP Identity Server");

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    let settings = config.auth_settings();

    // Persistence: Postgres when configured, in-memory otherwise
    let (identities, session_store): (Arc<dyn BaseIdentityStore>, Arc<dyn BaseSessionStore>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await
                    .context("Failed to connect to database")?;

                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run migrations")?;
                tracing::info!("Database migrations applied");

                (
                    Arc::new(PgIdentityStore::new(pool.clone())),
                    Arc::new(PgSessionStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory stores");
                (
                    Arc::new(MemoryIdentityStore::new()),
                    Arc::new(MemorySessionStore::new()),
                )
            }
        };

    // Verification provider client (shared by code dispatch and key download)
    let mut verify_options = PhoneVerifyOptions::new(config.verify_api_key.clone());
    verify_options.base_url = config.verify_api_base_url.clone();
    verify_options.jwks_url = config.verify_jwks_url.clone();
    verify_options.timeout = settings.provider_timeout;
    let verify_service = Arc::new(
        PhoneVerifyService::new(verify_options).context("Failed to create verification client")?,
    );

    let verifier = Arc::new(JwksAssertionVerifier::new(
        verify_service.clone(),
        AssertionRules::new(config.assertion_issuer(), config.verify_project_id.clone()),
    ));

    let server_deps = ServerDeps::new(
        identities,
        session_store,
        Arc::new(PhoneVerifyAdapter::new(
            verify_service,
            settings.provider_timeout,
        )),
        verifier,
        settings,
    );

    // Expired session cleanup
    let _scheduler = start_scheduler(server_deps.sessions.clone())
        .await
        .context("Failed to start scheduled tasks")?;

    let app = build_app(server_deps, &config)?;

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind server")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
