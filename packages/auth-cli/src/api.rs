//! Typed client for the identity server's `/auth/*` endpoints.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use server_core::domains::auth::models::{PhoneNumber, RoleId};
use server_core::domains::auth::{
    DispatchRequest, ExistenceReason, FlowMode, SessionClaims, SignedAssertion, SignupDraft,
    VerificationHandle,
};

// =============================================================================
// Replies
// =============================================================================

/// Error body the server sends with every non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    pub message: String,
    #[serde(default)]
    pub reason: Option<ExistenceReason>,
}

#[derive(Debug, Error)]
#[error("{} ({status})", .reply.message)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub reply: ErrorReply,
}

impl ApiFailure {
    /// Rejected assertion. The attempt is over and a new code is needed.
    pub fn is_verification_failure(&self) -> bool {
        self.reply.error == "verification_failed"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum LoginPrecheckReply {
    Login { phone: PhoneNumber, role_id: RoleId },
    Signup { phone: PhoneNumber },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupPrecheckReply {
    pub exists: bool,
    #[serde(default)]
    pub reason: Option<ExistenceReason>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReply {
    pub mode: FlowMode,
    pub sent: bool,
    pub phone: PhoneNumber,
    #[serde(default)]
    pub verification_handle: Option<VerificationHandle>,
    #[serde(default)]
    pub resend_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReply {
    pub session_token: String,
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoginVerifyReply {
    Session(SessionReply),
    Route { mode: FlowMode, phone: PhoneNumber },
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Serialize)]
struct PhoneBody<'a> {
    phone: &'a str,
}

#[derive(Serialize)]
struct SignupPrecheckBody<'a> {
    phone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginVerifyBody<'a> {
    signed_assertion: &'a SignedAssertion,
    claimed_phone: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignupVerifyBody<'a> {
    signed_assertion: &'a SignedAssertion,
    profile: &'a SignupDraft,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerClient {
    base_url: String,
    client: Client,
}

impl ServerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        parse(response).await
    }

    pub async fn login_precheck(&self, phone: &str) -> Result<LoginPrecheckReply> {
        self.post("/auth/login/precheck", &PhoneBody { phone }).await
    }

    pub async fn signup_precheck(
        &self,
        phone: &str,
        email: Option<&str>,
    ) -> Result<SignupPrecheckReply> {
        self.post("/auth/signup/precheck", &SignupPrecheckBody { phone, email })
            .await
    }

    pub async fn send_code(&self, request: &DispatchRequest) -> Result<DispatchReply> {
        self.post("/auth/otp/send", request).await
    }

    pub async fn login_verify(
        &self,
        signed_assertion: &SignedAssertion,
        claimed_phone: &str,
    ) -> Result<LoginVerifyReply> {
        self.post(
            "/auth/login/verify",
            &LoginVerifyBody {
                signed_assertion,
                claimed_phone,
            },
        )
        .await
    }

    pub async fn signup_verify(
        &self,
        signed_assertion: &SignedAssertion,
        profile: &SignupDraft,
    ) -> Result<SessionReply> {
        self.post(
            "/auth/signup/verify",
            &SignupVerifyBody {
                signed_assertion,
                profile,
            },
        )
        .await
    }

    /// Claims behind `token`, or `None` when the server no longer knows it.
    pub async fn session(&self, token: &str) -> Result<Option<SessionClaims>> {
        let response = self
            .client
            .get(self.url("/auth/session"))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        parse(response).await.map(Some)
    }

    /// Revoke `token`. A token the server already forgot counts as revoked.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;

        match response.status() {
            status if status.is_success() || status == StatusCode::UNAUTHORIZED => Ok(()),
            _ => Err(failure(response).await.into()),
        }
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(failure(response).await.into());
    }
    response
        .json()
        .await
        .context("Unexpected response from server")
}

async fn failure(response: Response) -> ApiFailure {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let reply = serde_json::from_str(&text).unwrap_or_else(|_| ErrorReply {
        error: "unexpected_response".to_string(),
        message: if text.is_empty() {
            status.to_string()
        } else {
            text
        },
        reason: None,
    });
    ApiFailure { status, reply }
}
