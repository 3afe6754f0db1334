//! Session registry stores.
//!
//! Entries are keyed by the token hash; the raw bearer token never reaches
//! either store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::{BaseSessionStore, StoreError};
use crate::common::{OrgId, UserId};
use crate::domains::auth::models::{PhoneNumber, RoleId};
use crate::domains::auth::{SessionClaims, SessionEntry};

// =============================================================================
// Postgres
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    user_id: UserId,
    #[sqlx(try_from = "String")]
    role_id: RoleId,
    org_id: Option<OrgId>,
    permissions: Vec<String>,
    phone: PhoneNumber,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionEntry {
    fn from(row: SessionRow) -> Self {
        SessionEntry {
            claims: SessionClaims {
                user_id: row.user_id,
                role_id: row.role_id,
                org_id: row.org_id,
                permissions: row.permissions,
                phone: row.phone,
            },
            issued_at: row.issued_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseSessionStore for PgSessionStore {
    async fn insert(&self, token_hash: &str, entry: &SessionEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (token_hash, user_id, role_id, org_id, permissions, phone, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token_hash)
        .bind(entry.claims.user_id)
        .bind(entry.claims.role_id.code())
        .bind(entry.claims.org_id)
        .bind(&entry.claims.permissions)
        .bind(&entry.claims.phone)
        .bind(entry.issued_at)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, token_hash: &str) -> Result<Option<SessionEntry>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT user_id, role_id, org_id, permissions, phone, issued_at, expires_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionEntry::from))
    }

    async fn delete(&self, token_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseSessionStore for MemorySessionStore {
    async fn insert(&self, token_hash: &str, entry: &SessionEntry) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(token_hash.to_string(), entry.clone());
        Ok(())
    }

    async fn get(&self, token_hash: &str) -> Result<Option<SessionEntry>, StoreError> {
        Ok(self.sessions.read().await.get(token_hash).cloned())
    }

    async fn delete(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(token_hash).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}
