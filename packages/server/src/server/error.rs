//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::common::AuthError;
use crate::domains::auth::{AuthFlowError, ExistenceReason};

#[derive(Debug)]
pub enum ApiError {
    Flow(AuthFlowError),
    Auth(AuthError),
}

impl From<AuthFlowError> for ApiError {
    fn from(err: AuthFlowError) -> Self {
        Self::Flow(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExistenceReason>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, ErrorBody) {
        let body = |error, message: String| ErrorBody {
            error,
            message,
            reason: None,
        };

        match self {
            Self::Flow(err) => {
                let message = err.public_message();
                match err {
                    AuthFlowError::InvalidPhoneNumber(_) => {
                        (StatusCode::BAD_REQUEST, body("invalid_phone_number", message))
                    }
                    AuthFlowError::InvalidProfile(_) => {
                        (StatusCode::BAD_REQUEST, body("invalid_profile", message))
                    }
                    AuthFlowError::ProviderUnavailable(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        body("provider_unavailable", message),
                    ),
                    // Reasons differ only in the server logs.
                    AuthFlowError::InvalidOrExpiredAssertion
                    | AuthFlowError::PhoneMismatch
                    | AuthFlowError::ServerMisconfiguration(_) => {
                        (StatusCode::UNAUTHORIZED, body("verification_failed", message))
                    }
                    AuthFlowError::Conflict(reason) => (
                        StatusCode::CONFLICT,
                        ErrorBody {
                            error: "conflict",
                            message,
                            reason: Some(*reason),
                        },
                    ),
                    AuthFlowError::Internal(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        body("internal_error", message),
                    ),
                }
            }
            Self::Auth(err) => match err {
                AuthError::AuthenticationRequired => {
                    (StatusCode::UNAUTHORIZED, body("unauthorized", err.to_string()))
                }
                AuthError::PermissionDenied(_) => {
                    (StatusCode::FORBIDDEN, body("forbidden", err.to_string()))
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Flow(AuthFlowError::Internal(e)) = &self {
            error!(error = %e, "request failed");
        }
        let (status, body) = self.parts();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_failures_look_identical() {
        let mismatch = ApiError::from(AuthFlowError::PhoneMismatch).parts();
        let expired = ApiError::from(AuthFlowError::InvalidOrExpiredAssertion).parts();
        let misconfigured =
            ApiError::from(AuthFlowError::ServerMisconfiguration("no keys".into())).parts();

        for (status, body) in [mismatch, expired, misconfigured] {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            let json = serde_json::to_value(body).unwrap();
            assert_eq!(
                json,
                serde_json::json!({"error": "verification_failed", "message": "Verification failed"})
            );
        }
    }

    #[test]
    fn conflict_carries_reason() {
        let (status, body) = ApiError::from(AuthFlowError::Conflict(ExistenceReason::Phone)).parts();
        assert_eq!(status, StatusCode::CONFLICT);
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["reason"], "phone");
        assert_eq!(json["message"], "Phone already registered");
    }

    #[test]
    fn status_codes() {
        let status = |e: ApiError| e.parts().0;
        assert_eq!(
            status(AuthFlowError::InvalidPhoneNumber("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AuthFlowError::ProviderUnavailable("x".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(AuthError::AuthenticationRequired.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(AuthError::PermissionDenied("orgs:manage".into()).into()),
            StatusCode::FORBIDDEN
        );
    }
}
