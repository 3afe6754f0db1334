use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest<'a> {
    pub phone_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recaptcha_token: Option<&'a str>,
}

/// Response to a code dispatch. `session_info` is the verification handle
/// that must be presented together with the code.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeResponse {
    pub session_info: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest<'a> {
    pub session_info: &'a str,
    pub code: &'a str,
}

/// Response to a successful code exchange. `id_token` is the signed
/// assertion for `phone_number`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of `id_token` in seconds, sent as a string by the provider.
    #[serde(default)]
    pub expires_in: Option<String>,
    #[serde(default)]
    pub local_id: Option<String>,
    #[serde(default)]
    pub is_new_user: bool,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

/// One RSA public key from the provider's key set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Jwk {
    pub kid: String,
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Key set plus how long the provider allows it to be cached.
#[derive(Debug, Clone)]
pub struct SigningKeys {
    pub keys: Vec<Jwk>,
    pub max_age: Option<Duration>,
}
