use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::kernel::ServerDeps;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    identity_store: StoreHealth,
}

#[derive(Serialize)]
pub struct StoreHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// Checks identity store connectivity and responsiveness (5s budget).
///
/// Returns 200 OK if the store answers, 503 Service Unavailable otherwise.
pub async fn health_handler(
    Extension(deps): Extension<ServerDeps>,
) -> (StatusCode, Json<HealthResponse>) {
    let store_health =
        match tokio::time::timeout(Duration::from_secs(5), deps.identities.ping()).await {
            Ok(Ok(())) => StoreHealth {
                status: "ok".to_string(),
                error: None,
            },
            Ok(Err(e)) => StoreHealth {
                status: "error".to_string(),
                error: Some(format!("Query failed: {}", e)),
            },
            Err(_) => StoreHealth {
                status: "error".to_string(),
                error: Some("Query timeout (>5s)".to_string()),
            },
        };

    let is_healthy = store_health.status == "ok";

    let (status_code, overall_status) = if is_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: overall_status.to_string(),
            identity_store: store_health,
        }),
    )
}
