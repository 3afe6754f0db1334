//! Auth domain - phone verification, identity lookup and sessions
//!
//! Flow:
//!   precheck → dispatch code → (client exchanges code for assertion)
//!     → complete login/signup → session issued
//!
//! Responsibilities:
//! - Phone normalization and plausibility checks
//! - Identity prechecks that never leak account details
//! - Assertion validation (the single trust boundary)
//! - Identity creation after a proven phone
//! - Opaque bearer sessions backed by a registry

pub mod actions;
pub mod assertion;
pub mod errors;
pub mod lookup;
pub mod machines;
pub mod models;
pub mod session;
pub mod types;

pub use assertion::{AssertionOutcome, AssertionValidator, RejectReason};
pub use errors::AuthFlowError;
pub use machines::{AuthFlow, AuthStage, FlowError};
pub use session::{IssuedSession, SessionClaims, SessionEntry, SessionIssuer};
pub use types::*;
