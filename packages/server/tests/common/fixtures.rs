//! Test fixtures.

use server_core::domains::auth::models::{normalize_phone, NewIdentity, PhoneNumber, RoleId};
use uuid::Uuid;

/// Random 10-digit domestic number, so tests sharing a database never collide.
pub fn unique_phone() -> String {
    format!("9{:09}", Uuid::new_v4().as_u128() % 1_000_000_000)
}

pub fn unique_email() -> String {
    format!("user-{}@example.org", Uuid::new_v4().simple())
}

pub fn normalized(raw: &str) -> PhoneNumber {
    normalize_phone(raw).expect("fixture phone normalizes")
}

pub fn new_identity(phone: &str, email: Option<&str>, role_id: RoleId) -> NewIdentity {
    NewIdentity {
        phone: normalized(phone),
        email: email.map(str::to_string),
        name: "Fixture User".to_string(),
        role_id,
        org_id: None,
        permissions: role_id.default_permissions(),
    }
}
