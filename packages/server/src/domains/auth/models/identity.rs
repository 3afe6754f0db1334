use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::{PhoneNumber, RoleId};
use crate::common::{OrgId, UserId};

/// Unique constraint on `identities.phone`.
pub const PHONE_UNIQUE_CONSTRAINT: &str = "identities_phone_unique";
/// Unique index on `lower(identities.email)`.
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "identities_email_unique";

lazy_static! {
    static ref EMAIL_SHAPE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern");
}

/// A registered account. Only ever created after its phone was verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: UserId,
    pub phone: PhoneNumber,
    pub email: Option<String>,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role_id: RoleId,
    pub org_id: Option<OrgId>,
    pub permissions: Vec<String>,
    pub phone_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for a record about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub phone: PhoneNumber,
    pub email: Option<String>,
    pub name: String,
    pub role_id: RoleId,
    pub org_id: Option<OrgId>,
    pub permissions: Vec<String>,
}

impl NewIdentity {
    /// Materialize the record with a fresh ID and the phone marked verified.
    pub fn into_record(self) -> IdentityRecord {
        IdentityRecord {
            id: UserId::new(),
            phone: self.phone,
            email: self.email,
            name: self.name,
            role_id: self.role_id,
            org_id: self.org_id,
            permissions: self.permissions,
            phone_verified: true,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl IdentityRecord {
    pub async fn find_by_phone(phone: &PhoneNumber, pool: &PgPool) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, IdentityRecord>("SELECT * FROM identities WHERE phone = $1")
            .bind(phone)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(email: &str, pool: &PgPool) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, IdentityRecord>(
            "SELECT * FROM identities WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Insert the record. Duplicate phone or email surfaces as a unique
    /// violation on the corresponding constraint.
    pub async fn insert(&self, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query_as::<_, IdentityRecord>(
            r#"
            INSERT INTO identities
                (id, phone, email, name, role_id, org_id, permissions, phone_verified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.phone)
        .bind(&self.email)
        .bind(&self.name)
        .bind(self.role_id.code())
        .bind(self.org_id)
        .bind(&self.permissions)
        .bind(self.phone_verified)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Emails are compared trimmed and case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::models::normalize_phone;

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last+tag@example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("space in@example.com"));
    }

    #[test]
    fn new_identity_is_created_verified() {
        let record = NewIdentity {
            phone: normalize_phone("9876543210").unwrap(),
            email: Some("a@b.com".to_string()),
            name: "Asha".to_string(),
            role_id: RoleId::Developer,
            org_id: None,
            permissions: RoleId::Developer.default_permissions(),
        }
        .into_record();

        assert!(record.phone_verified);
        assert_eq!(record.phone.as_str(), "+919876543210");
        assert_eq!(record.permissions, RoleId::Developer.default_permissions());
    }
}
