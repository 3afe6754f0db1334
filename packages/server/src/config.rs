use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::domains::auth::models::DEFAULT_COUNTRY_CODE;

/// Accepted `SESSION_TTL_HOURS` range: one hour to one year.
const SESSION_TTL_HOURS_RANGE: std::ops::RangeInclusive<i64> = 1..=24 * 365;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` runs the server on in-memory stores.
    pub database_url: Option<String>,
    pub verify_api_key: String,
    pub verify_api_base_url: String,
    pub verify_project_id: String,
    pub verify_jwks_url: String,
    pub verify_issuer_prefix: String,
    pub verify_timeout_secs: u64,
    pub otp_resend_cooldown_secs: u64,
    pub default_country_code: String,
    pub session_ttl_hours: i64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            verify_api_key: env::var("VERIFY_API_KEY").context("VERIFY_API_KEY must be set")?,
            verify_api_base_url: env::var("VERIFY_API_BASE_URL")
                .unwrap_or_else(|_| phone_verify::DEFAULT_BASE_URL.to_string()),
            verify_project_id: env::var("VERIFY_PROJECT_ID")
                .context("VERIFY_PROJECT_ID must be set")?,
            verify_jwks_url: env::var("VERIFY_JWKS_URL")
                .unwrap_or_else(|_| phone_verify::DEFAULT_JWKS_URL.to_string()),
            verify_issuer_prefix: env::var("VERIFY_ISSUER_PREFIX")
                .unwrap_or_else(|_| "https://securetoken.google.com/".to_string()),
            verify_timeout_secs: env::var("VERIFY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("VERIFY_TIMEOUT_SECS must be a number of seconds")?,
            otp_resend_cooldown_secs: env::var("OTP_RESEND_COOLDOWN_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("OTP_RESEND_COOLDOWN_SECS must be a number of seconds")?,
            default_country_code: env::var("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|_| DEFAULT_COUNTRY_CODE.to_string()),
            session_ttl_hours: parse_session_ttl_hours(
                &env::var("SESSION_TTL_HOURS").unwrap_or_else(|_| "24".to_string()),
            )?,
            allowed_origins: parse_list(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
        })
    }

    /// Expected `iss` claim of provider assertions.
    pub fn assertion_issuer(&self) -> String {
        format!("{}{}", self.verify_issuer_prefix, self.verify_project_id)
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            default_country_code: self.default_country_code.clone(),
            resend_cooldown: Duration::from_secs(self.otp_resend_cooldown_secs),
            provider_timeout: Duration::from_secs(self.verify_timeout_secs),
            session_ttl: chrono::Duration::hours(self.session_ttl_hours),
        }
    }
}

/// Settings the auth flow reads. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub default_country_code: String,
    pub resend_cooldown: Duration,
    pub provider_timeout: Duration,
    pub session_ttl: chrono::Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            resend_cooldown: Duration::from_secs(30),
            provider_timeout: Duration::from_secs(10),
            session_ttl: chrono::Duration::hours(24),
        }
    }
}

fn parse_session_ttl_hours(raw: &str) -> Result<i64> {
    let hours: i64 = raw
        .trim()
        .parse()
        .context("SESSION_TTL_HOURS must be a number of hours")?;
    anyhow::ensure!(
        SESSION_TTL_HOURS_RANGE.contains(&hours),
        "SESSION_TTL_HOURS must be between {} and {}, got {hours}",
        SESSION_TTL_HOURS_RANGE.start(),
        SESSION_TTL_HOURS_RANGE.end()
    );
    Ok(hours)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
