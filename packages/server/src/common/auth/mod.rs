//! Authorization checks against issued session claims.
//!
//! ```ignore
//! use crate::common::auth::{Actor, Capability};
//!
//! Actor::from_claims(&claims)
//!     .can(Capability::ProjectsWrite)
//!     .check()?;
//! ```

mod builder;
mod capability;
mod errors;

pub use builder::{Actor, CapabilityBuilder};
pub use capability::Capability;
pub use errors::AuthError;
