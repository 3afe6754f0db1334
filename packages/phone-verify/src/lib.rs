//! Client for an Identity Toolkit-style phone verification REST API.
//!
//! The provider sends one-time codes by SMS, exchanges a code plus the
//! returned session handle for a signed ID token, and publishes the RSA keys
//! that ID tokens are signed with.

use std::time::Duration;

pub mod models;

use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    ErrorEnvelope, JwkSet, SendCodeRequest, SendCodeResponse, SignInRequest, SignInResponse,
    SigningKeys,
};

pub const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

#[derive(Debug, Error)]
pub enum PhoneVerifyError {
    #[error("provider rejected phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("verification code rejected: {0}")]
    CodeRejected(String),

    #[error("provider throttled the request: {0}")]
    Throttled(String),

    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl PhoneVerifyError {
    /// Whether retrying later can succeed without changing the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Throttled(_) | Self::Transport(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            Self::InvalidPhoneNumber(_) | Self::CodeRejected(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhoneVerifyOptions {
    pub api_key: String,
    pub base_url: String,
    pub jwks_url: String,
    pub timeout: Duration,
}

impl PhoneVerifyOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhoneVerifyService {
    options: PhoneVerifyOptions,
    client: Client,
}

impl PhoneVerifyService {
    pub fn new(options: PhoneVerifyOptions) -> Result<Self, PhoneVerifyError> {
        let client = Client::builder().timeout(options.timeout).build()?;
        Ok(Self { options, client })
    }

    pub fn options(&self) -> &PhoneVerifyOptions {
        &self.options
    }

    /// Ask the provider to text a one-time code to `phone_number` (E.164).
    ///
    /// Every successful call replaces the previous handle for the number;
    /// the provider only honours the most recent one.
    pub async fn send_code(
        &self,
        phone_number: &str,
        recaptcha_token: Option<&str>,
    ) -> Result<SendCodeResponse, PhoneVerifyError> {
        let body = SendCodeRequest {
            phone_number,
            recaptcha_token,
        };
        let response: SendCodeResponse = self.post("accounts:sendVerificationCode", &body).await?;
        debug!(phone = %phone_number, "verification code dispatched");
        Ok(response)
    }

    /// Exchange a handle and the code the user typed for a signed ID token.
    ///
    /// This is the client half of the flow. Servers never see the code.
    pub async fn sign_in_with_code(
        &self,
        session_info: &str,
        code: &str,
    ) -> Result<SignInResponse, PhoneVerifyError> {
        let body = SignInRequest { session_info, code };
        self.post("accounts:signInWithPhoneNumber", &body).await
    }

    /// Download the public keys ID tokens are signed with.
    pub async fn fetch_signing_keys(&self) -> Result<SigningKeys, PhoneVerifyError> {
        let response = self.client.get(&self.options.jwks_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(%status, "signing key download failed");
            return Err(PhoneVerifyError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let max_age = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age);
        let set = response.json::<JwkSet>().await?;

        Ok(SigningKeys {
            keys: set.keys,
            max_age,
        })
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> Result<R, PhoneVerifyError>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.options.base_url.trim_end_matches('/'), method);

        let response = self
            .client
            .post(url)
            .query(&[("key", self.options.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);
            warn!(%status, method, message = %message, "provider returned an error");
            return Err(classify_error(status, &message));
        }

        Ok(response.json::<R>().await?)
    }
}

/// Map a provider error message onto the error taxonomy.
///
/// Messages look like `INVALID_CODE` or `TOO_MANY_ATTEMPTS_TRY_LATER : detail`.
pub fn classify_error(status: StatusCode, message: &str) -> PhoneVerifyError {
    let code = message.split(" : ").next().unwrap_or_default().trim();

    match code {
        "INVALID_PHONE_NUMBER" | "MISSING_PHONE_NUMBER" => {
            PhoneVerifyError::InvalidPhoneNumber(message.to_string())
        }
        "INVALID_CODE" | "MISSING_CODE" | "INVALID_SESSION_INFO" | "MISSING_SESSION_INFO"
        | "SESSION_EXPIRED" | "CODE_EXPIRED" => PhoneVerifyError::CodeRejected(message.to_string()),
        "TOO_MANY_ATTEMPTS_TRY_LATER" | "QUOTA_EXCEEDED" => {
            PhoneVerifyError::Throttled(message.to_string())
        }
        _ if status == StatusCode::TOO_MANY_REQUESTS => {
            PhoneVerifyError::Throttled(message.to_string())
        }
        _ => PhoneVerifyError::Provider {
            status: status.as_u16(),
            message: message.to_string(),
        },
    }
}

fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|directive| directive.strip_prefix("max-age="))
        .and_then(|secs| secs.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_invalid_phone() {
        let err = classify_error(StatusCode::BAD_REQUEST, "INVALID_PHONE_NUMBER : TOO_SHORT");
        assert!(matches!(err, PhoneVerifyError::InvalidPhoneNumber(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn classifies_code_rejections() {
        for message in ["INVALID_CODE", "SESSION_EXPIRED", "CODE_EXPIRED"] {
            let err = classify_error(StatusCode::BAD_REQUEST, message);
            assert!(matches!(err, PhoneVerifyError::CodeRejected(_)), "{message}");
        }
    }

    #[test]
    fn classifies_throttling() {
        let err = classify_error(StatusCode::BAD_REQUEST, "TOO_MANY_ATTEMPTS_TRY_LATER");
        assert!(matches!(err, PhoneVerifyError::Throttled(_)));
        assert!(err.is_retryable());

        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, PhoneVerifyError::Throttled(_)));
    }

    #[test]
    fn unknown_errors_keep_status() {
        let err = classify_error(StatusCode::SERVICE_UNAVAILABLE, "backend down");
        match err {
            PhoneVerifyError::Provider { status, .. } => assert_eq!(status, 503),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_max_age() {
        assert_eq!(
            parse_max_age("public, max-age=19204, must-revalidate, no-transform"),
            Some(Duration::from_secs(19204))
        );
        assert_eq!(parse_max_age("no-cache"), None);
    }

    #[test]
    fn sign_in_response_deserializes() {
        let json = r#"{
            "idToken": "a.b.c",
            "refreshToken": "r",
            "expiresIn": "3600",
            "localId": "uid",
            "isNewUser": true,
            "phoneNumber": "+919876543210"
        }"#;
        let response: models::SignInResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id_token, "a.b.c");
        assert_eq!(response.phone_number.as_deref(), Some("+919876543210"));
        assert!(response.is_new_user);
    }

    #[test]
    fn options_default_to_public_endpoints() {
        let options = PhoneVerifyOptions::new("key");
        assert_eq!(options.base_url, DEFAULT_BASE_URL);
        assert_eq!(options.timeout, Duration::from_secs(10));
    }
}
