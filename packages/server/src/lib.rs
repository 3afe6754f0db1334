// Phone OTP Identity Service - API Core
//
// This crate verifies phone ownership through a third-party provider, creates
// identity records for verified phones and issues bearer sessions.
//
// The auth flow lives in domains/auth; infrastructure behind traits in kernel.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
