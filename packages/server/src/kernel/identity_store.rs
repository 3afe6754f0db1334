//! Identity record stores: Postgres for deployments, in-memory for tests and
//! database-less development.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::{BaseIdentityStore, StoreError};
use crate::common::UserId;
use crate::domains::auth::models::{
    normalize_email, IdentityRecord, NewIdentity, PhoneNumber, EMAIL_UNIQUE_CONSTRAINT,
    PHONE_UNIQUE_CONSTRAINT,
};
use crate::domains::auth::ExistenceReason;

// =============================================================================
// Postgres
// =============================================================================

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseIdentityStore for PgIdentityStore {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(IdentityRecord::find_by_phone(phone, &self.pool).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(IdentityRecord::find_by_email(&normalize_email(email), &self.pool).await?)
    }

    async fn insert_if_phone_unique(
        &self,
        identity: NewIdentity,
    ) -> Result<IdentityRecord, StoreError> {
        identity
            .into_record()
            .insert(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// The unique constraints are the arbiter of concurrent signups for the
/// same phone; the loser's insert fails here.
pub(crate) fn map_unique_violation(err: sqlx::Error) -> StoreError {
    let reason = match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            match db_err.constraint() {
                Some(PHONE_UNIQUE_CONSTRAINT) => Some(ExistenceReason::Phone),
                Some(EMAIL_UNIQUE_CONSTRAINT) => Some(ExistenceReason::Email),
                _ => None,
            }
        }
        _ => None,
    };

    match reason {
        Some(reason) => StoreError::Duplicate(reason),
        None => StoreError::Database(err),
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
pub struct MemoryIdentityStore {
    records: RwLock<HashMap<UserId, IdentityRecord>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl BaseIdentityStore for MemoryIdentityStore {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<IdentityRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.values().find(|r| &r.phone == phone).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let wanted = normalize_email(email);
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.email.as_deref().map(normalize_email).as_deref() == Some(wanted.as_str()))
            .cloned())
    }

    async fn insert_if_phone_unique(
        &self,
        identity: NewIdentity,
    ) -> Result<IdentityRecord, StoreError> {
        // Check and insert under one write lock so racing inserts serialize.
        let mut records = self.records.write().await;

        let wanted_email = identity.email.as_deref().map(normalize_email);
        let phone_taken = records.values().any(|r| r.phone == identity.phone);
        let email_taken = wanted_email.as_deref().is_some_and(|wanted| {
            records
                .values()
                .any(|r| r.email.as_deref().map(normalize_email).as_deref() == Some(wanted))
        });

        if let Some(reason) = ExistenceReason::from_matches(phone_taken, email_taken) {
            return Err(StoreError::Duplicate(reason));
        }

        let record = identity.into_record();
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
