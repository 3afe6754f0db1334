//! Postgres-backed identity and session stores.
//!
//! Requires Docker. All tests share one container (see `common::harness`).

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use test_context::test_context;

use crate::common::{new_identity, normalized, unique_email, unique_phone, TestHarness};
use server_core::domains::auth::models::RoleId;
use server_core::domains::auth::session::hash_token;
use server_core::domains::auth::{ExistenceReason, SessionClaims, SessionEntry, SessionIssuer};
use server_core::kernel::{BaseIdentityStore, BaseSessionStore, StoreError};

#[test_context(TestHarness)]
#[tokio::test]
async fn insert_and_find_identity(ctx: &TestHarness) {
    let store = ctx.identities();
    let phone = unique_phone();
    let email = unique_email();

    let record = store
        .insert_if_phone_unique(new_identity(&phone, Some(&email), RoleId::Developer))
        .await
        .unwrap();
    assert!(record.phone_verified);
    assert_eq!(record.role_id, RoleId::Developer);

    let by_phone = store.find_by_phone(&normalized(&phone)).await.unwrap();
    assert_eq!(by_phone.as_ref().map(|r| r.id), Some(record.id));

    let by_email = store
        .find_by_email(&email.to_uppercase())
        .await
        .unwrap()
        .expect("email lookup is case-insensitive");
    assert_eq!(by_email.id, record.id);
    assert_eq!(by_email.permissions, RoleId::Developer.default_permissions());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn duplicate_phone_maps_to_phone_conflict(ctx: &TestHarness) {
    let store = ctx.identities();
    let phone = unique_phone();

    store
        .insert_if_phone_unique(new_identity(&phone, None, RoleId::Mentor))
        .await
        .unwrap();
    let err = store
        .insert_if_phone_unique(new_identity(&phone, Some(&unique_email()), RoleId::Developer))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(ExistenceReason::Phone)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn duplicate_email_maps_to_email_conflict(ctx: &TestHarness) {
    let store = ctx.identities();
    let email = unique_email();

    store
        .insert_if_phone_unique(new_identity(&unique_phone(), Some(&email), RoleId::Mentor))
        .await
        .unwrap();
    let err = store
        .insert_if_phone_unique(new_identity(
            &unique_phone(),
            Some(&email.to_uppercase()),
            RoleId::Mentor,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(ExistenceReason::Email)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_inserts_have_one_winner(ctx: &TestHarness) {
    let store = Arc::new(ctx.identities());
    let phone = unique_phone();

    let attempts = (0..8).map(|_| {
        let store = store.clone();
        let identity = new_identity(&phone, None, RoleId::Developer);
        tokio::spawn(async move { store.insert_if_phone_unique(identity).await })
    });

    let mut successes = 0;
    let mut conflicts = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        match attempt.await.unwrap() {
            Ok(_) => successes += 1,
            Err(StoreError::Duplicate(ExistenceReason::Phone)) => conflicts += 1,
            Err(e) => panic!("unexpected store error: {e}"),
        }
    }
    assert_eq!((successes, conflicts), (1, 7));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn ping_reaches_database(ctx: &TestHarness) {
    ctx.identities().ping().await.unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn session_issue_resolve_revoke(ctx: &TestHarness) {
    let record = ctx
        .identities()
        .insert_if_phone_unique(new_identity(&unique_phone(), None, RoleId::Developer))
        .await
        .unwrap();
    let issuer = SessionIssuer::new(Arc::new(ctx.sessions()), Duration::hours(1));

    let session = issuer.issue(&record).await.unwrap();
    assert_eq!(session.claims, SessionClaims::from_record(&record));

    let resolved = issuer.resolve(&session.session_token).await.unwrap();
    assert_eq!(resolved, Some(session.claims.clone()));

    // Only the hash is stored.
    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE token_hash = $1")
        .bind(&session.session_token)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);

    assert!(issuer.revoke(&session.session_token).await.unwrap());
    assert_eq!(issuer.resolve(&session.session_token).await.unwrap(), None);
    assert!(!issuer.revoke(&session.session_token).await.unwrap());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn expired_sessions_are_cleaned_up(ctx: &TestHarness) {
    let store = ctx.sessions();
    let record = ctx
        .identities()
        .insert_if_phone_unique(new_identity(&unique_phone(), None, RoleId::Mentor))
        .await
        .unwrap();
    let claims = SessionClaims::from_record(&record);
    let now = Utc::now();

    let expired_hash = hash_token(&format!("expired-{}", record.id));
    let live_hash = hash_token(&format!("live-{}", record.id));
    store
        .insert(
            &expired_hash,
            &SessionEntry {
                claims: claims.clone(),
                issued_at: now - Duration::hours(2),
                expires_at: now - Duration::hours(1),
            },
        )
        .await
        .unwrap();
    store
        .insert(
            &live_hash,
            &SessionEntry {
                claims: claims.clone(),
                issued_at: now,
                expires_at: now + Duration::hours(1),
            },
        )
        .await
        .unwrap();

    let removed = store.delete_expired(now).await.unwrap();
    assert!(removed >= 1);
    assert_eq!(store.get(&expired_hash).await.unwrap(), None);

    let live = store.get(&live_hash).await.unwrap().expect("live session kept");
    assert_eq!(live.claims, claims);
}
