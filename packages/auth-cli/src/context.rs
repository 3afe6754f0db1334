//! Application context with shared state and utilities

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use dialoguer::theme::ColorfulTheme;
use phone_verify::{PhoneVerifyOptions, PhoneVerifyService};
use server_core::domains::auth::models::{PhoneNormalizer, DEFAULT_COUNTRY_CODE};

use crate::api::ServerClient;

/// Settings read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub server_url: String,
    /// Only needed by commands that exchange a code.
    pub verify_api_key: Option<String>,
    pub verify_api_base_url: String,
    pub default_country_code: String,
    pub session_file: PathBuf,
    pub app_verification_token: Option<String>,
}

impl CliConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            server_url: env::var("OTP_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            verify_api_key: env::var("VERIFY_API_KEY").ok().filter(|k| !k.is_empty()),
            verify_api_base_url: env::var("VERIFY_API_BASE_URL")
                .unwrap_or_else(|_| phone_verify::DEFAULT_BASE_URL.to_string()),
            default_country_code: env::var("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|_| DEFAULT_COUNTRY_CODE.to_string()),
            session_file: env::var("OTP_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".otp-session.json")),
            app_verification_token: env::var("OTP_APP_VERIFICATION_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        }
    }
}

/// Application context passed to all commands
pub struct AppContext {
    pub config: CliConfig,
    pub server: ServerClient,
    pub normalizer: PhoneNormalizer,
    pub quiet: bool,
}

impl AppContext {
    pub fn new(config: CliConfig, quiet: bool) -> Result<Self> {
        let server = ServerClient::new(&config.server_url)?;
        let normalizer = PhoneNormalizer::new(config.default_country_code.clone());
        Ok(Self {
            config,
            server,
            normalizer,
            quiet,
        })
    }

    /// Provider client for the code exchange, which happens on this side.
    pub fn provider(&self) -> Result<PhoneVerifyService> {
        let api_key = self
            .config
            .verify_api_key
            .clone()
            .context("VERIFY_API_KEY must be set to exchange verification codes")?;

        let mut options = PhoneVerifyOptions::new(api_key);
        options.base_url = self.config.verify_api_base_url.clone();
        PhoneVerifyService::new(options).context("Failed to create verification client")
    }

    pub fn theme(&self) -> ColorfulTheme {
        ColorfulTheme::default()
    }

    pub fn print_header(&self, msg: &str) {
        if !self.quiet {
            println!();
            println!("{}", style(msg).bold());
        }
    }

    pub fn print_success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", style(msg).green());
        }
    }

    pub fn print_warning(&self, msg: &str) {
        if !self.quiet {
            println!("{}", style(msg).yellow());
        }
    }

    pub fn print_info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", style(msg).cyan());
        }
    }
}
