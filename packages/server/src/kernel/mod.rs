//! Kernel module - server infrastructure and dependencies.

pub mod assertion_keys;
pub mod deps;
pub mod identity_store;
pub mod scheduled_tasks;
pub mod session_store;
pub mod test_dependencies;
pub mod traits;

pub use assertion_keys::{AssertionRules, JwksAssertionVerifier, SigningKeySource};
pub use deps::{PhoneVerifyAdapter, ServerDeps};
pub use identity_store::{MemoryIdentityStore, PgIdentityStore};
pub use session_store::{MemorySessionStore, PgSessionStore};
pub use test_dependencies::TestDependencies;
pub use traits::*;
