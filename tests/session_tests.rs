use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
};
use chrono::{Duration, Utc};
use expense_tracker::{
    config::{SameSite, SessionConfig},
    middleware::start_session,
    session::{
        MemorySessionStore, SessionData, SessionError, SessionManager, SessionStore,
        SessionStoreState,
    },
};
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt;

fn manager() -> (Arc<MemorySessionStore>, SessionManager) {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::new(store.clone() as SessionStoreState, SessionConfig::default());
    (store, manager)
}

#[tokio::test]
async fn test_new_session_gets_cookie_once() {
    let (store, manager) = manager();

    let session = manager.start(None).await.unwrap();
    assert!(session.is_active());
    session.put("answer", 42);

    let cookie = manager.save(&session).await.unwrap().expect("new session sets a cookie");
    assert_eq!(cookie.name(), "expense_tracker_session");
    assert_eq!(cookie.value(), session.id());
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.http_only(), Some(true));
    assert!(!session.is_active());
    assert_eq!(store.len(), 1);

    // Saving a closed session is a no-op.
    assert!(manager.save(&session).await.unwrap().is_none());

    // Resuming it needs no new cookie.
    let resumed = manager.start(Some(&session.id())).await.unwrap();
    assert_eq!(resumed.get_as::<i64>("answer"), Some(42));
    assert!(manager.save(&resumed).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_cookie_is_not_adopted() {
    let (_store, manager) = manager();

    let session = manager.start(Some("attacker-chosen-id")).await.unwrap();
    assert_ne!(session.id(), "attacker-chosen-id");
    assert!(!session.has("user"));
}

#[tokio::test]
async fn test_regenerate_moves_data_and_destroys_old_id() {
    let (store, manager) = manager();

    let first = manager.start(None).await.unwrap();
    first.put("user", 7);
    manager.save(&first).await.unwrap();
    let old_id = first.id();

    let session = manager.start(Some(&old_id)).await.unwrap();
    assert!(session.regenerate());
    let new_id = session.id();
    assert_ne!(new_id, old_id);

    let cookie = manager.save(&session).await.unwrap().expect("regenerated id is sent");
    assert_eq!(cookie.value(), new_id);
    assert!(store.load(&old_id).await.unwrap().is_none());
    assert_eq!(store.load(&new_id).await.unwrap().unwrap()["user"], json!(7));
}

#[tokio::test]
async fn test_flash_survives_one_read() {
    let (_store, manager) = manager();

    let session = manager.start(None).await.unwrap();
    session.flash("errors", json!({ "name": ["Name is required"] }));
    manager.save(&session).await.unwrap();

    let next = manager.start(Some(&session.id())).await.unwrap();
    assert_eq!(
        next.get_flash("errors"),
        Some(json!({ "name": ["Name is required"] }))
    );
    assert_eq!(next.get_flash("errors"), None);
    // An empty flash bag is dropped entirely.
    assert!(!next.has("flash"));
}

#[tokio::test]
async fn test_forget_and_get_or() {
    let (_store, manager) = manager();

    let session = manager.start(None).await.unwrap();
    session.put("user", 1);
    session.forget("user");
    assert!(!session.has("user"));
    assert_eq!(session.get_or("user", json!(0)), json!(0));
}

#[tokio::test]
async fn test_expired_sessions_are_invisible_and_purged() {
    let store = MemorySessionStore::new();
    let mut data = SessionData::new();
    data.insert("user".to_string(), json!(1));

    store
        .store("stale", &data, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    store
        .store("fresh", &data, Utc::now() + Duration::minutes(30))
        .await
        .unwrap();

    assert!(store.load("stale").await.unwrap().is_none());
    assert!(store.load("fresh").await.unwrap().is_some());

    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_cookie_attributes_follow_config() {
    let store = Arc::new(MemorySessionStore::new()) as SessionStoreState;
    let config = SessionConfig {
        name: "sid".to_string(),
        secure: true,
        same_site: SameSite::Strict,
        ..SessionConfig::default()
    };
    let manager = SessionManager::new(store, config);

    let session = manager.start(None).await.unwrap();
    let cookie = manager.save(&session).await.unwrap().unwrap();

    assert_eq!(cookie.name(), "sid");
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(
        cookie.same_site(),
        Some(axum_extra::extract::cookie::SameSite::Strict)
    );
}

#[tokio::test]
async fn test_starting_a_session_twice_fails() {
    let (_store, manager) = manager();

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(from_fn_with_state(manager.clone(), start_session))
        .layer(from_fn_with_state(manager, start_session));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_save_rejects_lifetime_past_the_calendar() {
    let store = Arc::new(MemorySessionStore::new());
    let config = SessionConfig {
        lifetime: std::time::Duration::from_secs(10_u64.pow(13)),
        ..SessionConfig::default()
    };
    let manager = SessionManager::new(store.clone() as SessionStoreState, config);

    let session = manager.start(None).await.unwrap();
    let result = manager.save(&session).await;

    assert!(matches!(result, Err(SessionError::LifetimeOutOfRange)));
    assert!(store.is_empty());
}
