use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::models::{IdentityRecord, PhoneNumber, RoleId};
use crate::common::{OrgId, UserId};
use crate::kernel::{BaseSessionStore, StoreError};

/// Random bytes per bearer token (256 bits).
const TOKEN_BYTES: usize = 32;

/// What a session lets downstream handlers know about its holder. Taken
/// verbatim from the identity record at issuance and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub org_id: Option<OrgId>,
    pub permissions: Vec<String>,
    pub phone: PhoneNumber,
}

impl SessionClaims {
    pub fn from_record(record: &IdentityRecord) -> Self {
        Self {
            user_id: record.id,
            role_id: record.role_id,
            org_id: record.org_id,
            permissions: record.permissions.clone(),
            phone: record.phone.clone(),
        }
    }
}

/// Registry entry for an issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub claims: SessionClaims,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session handed back to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub session_token: String,
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

/// Sole authority over what "logged in" means.
///
/// Tokens are random and carry no user data. The registry keeps only their
/// SHA-256 hash, so a leaked registry cannot be replayed.
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn BaseSessionStore>,
    ttl: chrono::Duration,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn BaseSessionStore>, ttl: chrono::Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn issue(&self, record: &IdentityRecord) -> Result<IssuedSession, StoreError> {
        let token = generate_token();
        let issued_at = Utc::now();
        let entry = SessionEntry {
            claims: SessionClaims::from_record(record),
            issued_at,
            expires_at: issued_at + self.ttl,
        };

        self.store.insert(&hash_token(&token), &entry).await?;
        info!(user_id = %record.id, role = %record.role_id, "session issued");

        Ok(IssuedSession {
            session_token: token,
            claims: entry.claims,
            expires_at: entry.expires_at,
        })
    }

    /// Claims for a live token, `None` for unknown or expired ones.
    pub async fn resolve(&self, token: &str) -> Result<Option<SessionClaims>, StoreError> {
        let Some(entry) = self.store.get(&hash_token(token)).await? else {
            return Ok(None);
        };

        if entry.is_expired_at(Utc::now()) {
            debug!(user_id = %entry.claims.user_id, "session expired");
            return Ok(None);
        }

        Ok(Some(entry.claims))
    }

    /// Forget a token. Returns whether it was known.
    pub async fn revoke(&self, token: &str) -> Result<bool, StoreError> {
        self.store.delete(&hash_token(token)).await
    }

    /// Clean up expired sessions (run periodically)
    pub async fn cleanup_expired(&self) -> Result<u64, StoreError> {
        self.store.delete_expired(Utc::now()).await
    }
}

/// New bearer token: 256 random bits, base64url without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Registry key for a token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::models::{normalize_phone, NewIdentity};
    use crate::kernel::MemorySessionStore;

    fn record(role_id: RoleId) -> IdentityRecord {
        NewIdentity {
            phone: normalize_phone("9876543210").unwrap(),
            email: Some("a@b.com".to_string()),
            name: "Asha".to_string(),
            role_id,
            org_id: Some(OrgId::new()),
            permissions: role_id.default_permissions(),
        }
        .into_record()
    }

    fn issuer(ttl: chrono::Duration) -> SessionIssuer {
        SessionIssuer::new(Arc::new(MemorySessionStore::new()), ttl)
    }

    #[tokio::test]
    async fn test_claims_mirror_the_record() {
        let record = record(RoleId::Developer);
        let session = issuer(chrono::Duration::hours(24)).issue(&record).await.unwrap();

        assert_eq!(session.claims.user_id, record.id);
        assert_eq!(session.claims.role_id, RoleId::Developer);
        assert_eq!(session.claims.org_id, record.org_id);
        assert_eq!(session.claims.permissions, record.permissions);
        assert_eq!(session.claims.phone, record.phone);
    }

    #[tokio::test]
    async fn test_token_resolves_until_revoked() {
        let issuer = issuer(chrono::Duration::hours(24));
        let session = issuer.issue(&record(RoleId::Mentor)).await.unwrap();

        let claims = issuer.resolve(&session.session_token).await.unwrap();
        assert_eq!(claims, Some(session.claims.clone()));

        assert!(issuer.revoke(&session.session_token).await.unwrap());
        assert!(issuer.resolve(&session.session_token).await.unwrap().is_none());
        assert!(!issuer.revoke(&session.session_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_session_expiration() {
        let issuer = issuer(chrono::Duration::seconds(-1));
        let session = issuer.issue(&record(RoleId::Mentor)).await.unwrap();

        assert!(issuer.resolve(&session.session_token).await.unwrap().is_none());
        assert_eq!(issuer.cleanup_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let issuer = issuer(chrono::Duration::hours(1));
        assert!(issuer.resolve("nope").await.unwrap().is_none());
    }

    #[test]
    fn test_tokens_are_random_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_token_hash() {
        let hash1 = hash_token("token");
        assert_eq!(hash1, hash_token("token"));
        assert_ne!(hash1, hash_token("other"));
        assert_eq!(hash1.len(), 64);
    }
}
