//! Auth domain data types
//!
//! Values that cross the orchestrator boundary: provider handles and
//! assertions, signup drafts, and the outcomes of each flow step.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::models::{PhoneNumber, RoleId};
use super::session::IssuedSession;
use crate::common::OrgId;

/// Opaque provider handle for one code dispatch. Only the most recent handle
/// for a phone is honoured, and the provider enforces that.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationHandle(String);

impl VerificationHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VerificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationHandle(..)")
    }
}

/// Provider-signed proof that a phone number was confirmed by its holder.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedAssertion(String);

impl SignedAssertion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignedAssertion(..)")
    }
}

/// Which flow a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    Login,
    Signup,
}

/// Which existing field blocked a signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistenceReason {
    Phone,
    Email,
    Both,
}

impl ExistenceReason {
    pub fn from_matches(phone: bool, email: bool) -> Option<Self> {
        match (phone, email) {
            (true, true) => Some(Self::Both),
            (true, false) => Some(Self::Phone),
            (false, true) => Some(Self::Email),
            (false, false) => None,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Both => "phone and email",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Phone => "Phone already registered",
            Self::Email => "Email already registered",
            Self::Both => "Phone and email already registered",
        }
    }
}

/// Profile a person fills in before verifying their phone. Never stored
/// until the phone assertion succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupDraft {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role_id: RoleId,
    #[serde(default)]
    pub org_id: Option<OrgId>,
}

/// Body of a code dispatch request. The precheck for `purpose` runs before
/// any provider quota is spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum DispatchRequest {
    Login {
        phone: String,
        #[serde(default)]
        app_verification_token: Option<String>,
    },
    Signup {
        phone: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        app_verification_token: Option<String>,
    },
}

impl DispatchRequest {
    pub fn mode(&self) -> FlowMode {
        match self {
            Self::Login { .. } => FlowMode::Login,
            Self::Signup { .. } => FlowMode::Signup,
        }
    }
}

/// Result of the login precheck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPrecheck {
    /// Account exists; continue to code dispatch.
    Login { phone: PhoneNumber, role_id: RoleId },
    /// No account; the caller should switch to signup.
    Signup { phone: PhoneNumber },
}

/// Result of the signup precheck. Never says which account matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupPrecheck {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExistenceReason>,
    pub message: String,
}

impl SignupPrecheck {
    pub fn from_reason(reason: Option<ExistenceReason>) -> Self {
        match reason {
            Some(reason) => Self {
                exists: true,
                reason: Some(reason),
                message: reason.message().to_string(),
            },
            None => Self {
                exists: false,
                reason: None,
                message: "Phone and email available".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        mode: FlowMode,
        phone: PhoneNumber,
        handle: VerificationHandle,
        resend_after: Duration,
    },
    /// Login was requested for an unknown phone; nothing was sent.
    SignupRequired { phone: PhoneNumber },
}

#[derive(Debug, Clone)]
pub enum LoginCompletion {
    SessionIssued(IssuedSession),
    /// The assertion was valid but no account holds the phone.
    SignupRequired { phone: PhoneNumber },
}
