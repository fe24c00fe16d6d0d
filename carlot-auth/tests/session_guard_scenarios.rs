//! End-to-end behaviour of the session store and access guard over SQLite

use carlot_auth::{
    AccessGuard, AuthError, AuthorizationRequirement, DenialReason, Identity,
    PersistentSessionStore, RequestContext, RoleId, SessionCookie, SessionData,
    SessionRecordStore, SessionStore, SqliteSessionRecordStore, TokenError, TokenService,
};
use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

const TOKEN_SECRET: &[u8] = b"scenario-token-secret-0123456789";

struct Harness {
    records: Arc<SqliteSessionRecordStore>,
    store: Arc<PersistentSessionStore>,
    tokens: Arc<TokenService>,
    guard: AccessGuard,
}

async fn harness() -> Harness {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let records = Arc::new(SqliteSessionRecordStore::new(pool).await.unwrap());
    let store = Arc::new(PersistentSessionStore::new(
        records.clone(),
        Duration::hours(1),
    ));
    let tokens = Arc::new(TokenService::new(TOKEN_SECRET, Duration::days(30)).unwrap());
    let guard = AccessGuard::new(store.clone(), tokens.clone());

    Harness {
        records,
        store,
        tokens,
        guard,
    }
}

#[derive(Default)]
struct TestContext {
    session_id: Option<String>,
    session: Option<SessionData>,
    identity: Option<Identity>,
    invalidated: bool,
}

impl RequestContext for TestContext {
    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    fn session(&self) -> Option<SessionData> {
        self.session.clone()
    }

    fn attach_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    fn session_invalidated(&mut self) {
        self.invalidated = true;
    }
}

fn session_expiring_in(offset: Duration, jwt: Option<String>) -> SessionData {
    let mut data = SessionData::new(SessionCookie {
        expires: Some(Utc::now() + offset),
        original_max_age: Some(offset.num_milliseconds()),
        path: "/".to_string(),
        http_only: true,
        secure: false,
        same_site: None,
    });
    data.jwt = jwt;
    data
}

async fn wait_until_absent(records: &SqliteSessionRecordStore, id: &str) -> bool {
    for _ in 0..50 {
        if records.read(id).await.unwrap().is_none() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_valid_admin_session_is_allowed() {
    let h = harness().await;
    let token = h.tokens.issue(1, RoleId(0)).unwrap();
    let data = session_expiring_in(Duration::hours(1), Some(token));

    h.store.set("s1", &data).await.unwrap();
    assert_eq!(h.store.get("s1").await.unwrap(), Some(data));

    // The guard resolves the id through the store itself
    let mut ctx = TestContext {
        session_id: Some("s1".to_string()),
        ..Default::default()
    };
    let identity = h
        .guard
        .check_auth(&mut ctx, &AuthorizationRequirement::roles([0]))
        .await
        .unwrap();

    assert_eq!(
        identity,
        Identity {
            user_id: 1,
            role_id: RoleId(0)
        }
    );
    assert_eq!(ctx.identity, Some(identity));
    assert!(!ctx.invalidated);
}

#[tokio::test]
async fn test_expired_session_is_denied_and_removed() {
    let h = harness().await;
    let token = h.tokens.issue(1, RoleId(0)).unwrap();
    let data = session_expiring_in(Duration::seconds(-1), Some(token));

    h.store.set("s2", &data).await.unwrap();
    assert!(h.store.get("s2").await.unwrap().is_none());

    // As loaded by the HTTP layer before it lapsed
    let mut ctx = TestContext {
        session_id: Some("s2".to_string()),
        session: Some(data),
        ..Default::default()
    };
    let err = h
        .guard
        .check_auth(&mut ctx, &AuthorizationRequirement::roles([0]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::Unauthenticated(DenialReason::SessionExpired)
    ));
    assert!(ctx.invalidated);
    assert!(ctx.identity.is_none());
    assert!(wait_until_absent(&h.records, "s2").await);
}

#[tokio::test]
async fn test_lapsed_id_without_loaded_session_is_cleaned_up() {
    let h = harness().await;
    let data = session_expiring_in(Duration::seconds(-5), None);
    h.store.set("stale", &data).await.unwrap();

    let mut ctx = TestContext {
        session_id: Some("stale".to_string()),
        ..Default::default()
    };
    let err = h
        .guard
        .check_auth(&mut ctx, &AuthorizationRequirement::authenticated())
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "no_session");
    assert!(wait_until_absent(&h.records, "stale").await);
}

#[tokio::test]
async fn test_insufficient_role_is_forbidden() {
    let h = harness().await;
    let token = h.tokens.issue(9, RoleId(1)).unwrap();
    let data = session_expiring_in(Duration::hours(1), Some(token));
    h.store.set("s3", &data).await.unwrap();

    let mut ctx = TestContext {
        session_id: Some("s3".to_string()),
        session: Some(data),
        ..Default::default()
    };
    let err = h
        .guard
        .check_auth(&mut ctx, &AuthorizationRequirement::roles([0]))
        .await
        .unwrap_err();

    assert!(err.is_forbidden());
    assert!(!err.is_unauthenticated());
    assert!(ctx.identity.is_none());
    // Forbidden callers keep their session
    assert!(h.store.get("s3").await.unwrap().is_some());
}

#[tokio::test]
async fn test_foreign_signed_token_is_unauthenticated() {
    let h = harness().await;
    let foreign = TokenService::new(b"somebody-elses-secret-value", Duration::days(30)).unwrap();
    let token = foreign.issue(1, RoleId(0)).unwrap();
    let data = session_expiring_in(Duration::hours(1), Some(token));

    let mut ctx = TestContext {
        session_id: Some("s4".to_string()),
        session: Some(data),
        ..Default::default()
    };
    let err = h
        .guard
        .check_auth(&mut ctx, &AuthorizationRequirement::authenticated())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::Unauthenticated(DenialReason::InvalidCredential(
            TokenError::InvalidSignature
        ))
    ));
}

#[tokio::test]
async fn test_session_without_credential_is_unauthenticated() {
    let h = harness().await;
    let data = session_expiring_in(Duration::hours(1), None);
    h.store.set("mid-login", &data).await.unwrap();

    let mut ctx = TestContext {
        session_id: Some("mid-login".to_string()),
        ..Default::default()
    };
    let err = h
        .guard
        .check_auth(&mut ctx, &AuthorizationRequirement::authenticated())
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "missing_credential");
}

#[tokio::test]
async fn test_no_session_id() {
    let h = harness().await;
    let mut ctx = TestContext::default();

    let err = h
        .guard
        .check_auth(&mut ctx, &AuthorizationRequirement::authenticated())
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), "no_session");
}

#[tokio::test]
async fn test_round_trip_and_idempotent_destroy() {
    let h = harness().await;
    let mut data = session_expiring_in(Duration::minutes(10), None);
    data.insert("cart", vec!["a", "b"]).unwrap();

    h.store.set("rt", &data).await.unwrap();
    let loaded = h.store.get("rt").await.unwrap().unwrap();
    assert_eq!(loaded, data);
    assert_eq!(loaded.get::<Vec<String>>("cart").unwrap(), vec!["a", "b"]);

    // Overwrite keeps a single row
    data.set_credential(h.tokens.issue(3, RoleId(0)).unwrap());
    h.store.set("rt", &data).await.unwrap();
    assert_eq!(h.store.get("rt").await.unwrap(), Some(data));

    h.store.destroy("rt").await.unwrap();
    h.store.destroy("rt").await.unwrap();
    assert!(h.store.get("rt").await.unwrap().is_none());
}
