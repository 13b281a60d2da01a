use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, SameSite as CookieSameSite};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::{PgPool, types::Json};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

use crate::{
    config::{SameSite, SessionConfig},
    token::generate_secure_token,
};

/// Everything a session holds, keyed by name.
pub type SessionData = HashMap<String, Value>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session has already been started")]
    AlreadyStarted,

    #[error("session lifetime is out of range")]
    LifetimeOutOfRange,

    #[error("session store error: {0}")]
    Store(#[from] sqlx::Error),
}

// 1. SessionStore Contract
/// SessionStore
///
/// Server-side persistence for session payloads. Expired entries must behave exactly like
/// missing ones on `load`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError>;

    async fn store(
        &self,
        id: &str,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError>;

    async fn destroy(&self, id: &str) -> Result<(), SessionError>;

    /// Drops every expired entry and reports how many were removed.
    async fn purge_expired(&self) -> Result<u64, SessionError>;
}

pub type SessionStoreState = Arc<dyn SessionStore>;

// 2. Process-local store
/// MemorySessionStore
///
/// Keeps sessions in a map guarded by a lock. Used for local development and in tests;
/// contents vanish on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, (SessionData, DateTime<Utc>)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let entries = self.entries.read();
        Ok(entries
            .get(id)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(data, _)| data.clone()))
    }

    async fn store(
        &self,
        id: &str,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.entries
            .write()
            .insert(id.to_string(), (data.clone(), expires_at));
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        self.entries.write().remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let mut entries = self.entries.write();
        let before = entries.len();
        let now = Utc::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

// 3. Postgres-backed store
/// PostgresSessionStore
///
/// Persists sessions in the `sessions` table with the payload as JSONB, so sessions survive
/// restarts and are shared between instances.
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let row = sqlx::query_scalar::<_, Json<SessionData>>(
            "SELECT data FROM sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|Json(data)| data))
    }

    async fn store(
        &self,
        id: &str,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        sqlx::query(
            r#"INSERT INTO sessions (id, data, expires_at) VALUES ($1, $2, $3)
               ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at"#,
        )
        .bind(id)
        .bind(Json(data))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// 4. Per-request handle
struct SessionInner {
    id: String,
    data: SessionData,
    active: bool,
    // Never persisted yet, so the client has no cookie for this id.
    is_new: bool,
    // Persisted id replaced by `regenerate`; destroyed on save.
    regenerated_from: Option<String>,
}

/// Session
///
/// The request's view of its session. Clones share state, so the middleware that started the
/// session sees every mutation a handler makes before it saves.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
    flash_name: Arc<str>,
}

impl Session {
    fn new(id: String, data: SessionData, is_new: bool, flash_name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                data,
                active: true,
                is_new,
                regenerated_from: None,
            })),
            flash_name: Arc::from(flash_name),
        }
    }

    pub fn id(&self) -> String {
        self.inner.lock().id.clone()
    }

    /// True from `start` until the session has been saved.
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().data.get(key).cloned()
    }

    /// Reads `key` and decodes it; undecodable values count as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.lock().data.contains_key(key)
    }

    pub fn put(&self, key: &str, value: impl Into<Value>) {
        self.inner.lock().data.insert(key.to_string(), value.into());
    }

    pub fn forget(&self, key: &str) {
        self.inner.lock().data.remove(key);
    }

    /// regenerate
    ///
    /// Moves the data to a fresh id. The previous id is destroyed in the store when the session
    /// is saved and the client receives the new cookie.
    pub fn regenerate(&self) -> bool {
        let mut inner = self.inner.lock();
        let old_id = std::mem::replace(&mut inner.id, generate_secure_token());
        if !inner.is_new && inner.regenerated_from.is_none() {
            inner.regenerated_from = Some(old_id);
        }
        true
    }

    /// Stores `value` under the flash bag; it survives until the next `get_flash(key)`.
    pub fn flash(&self, key: &str, value: impl Into<Value>) {
        let mut inner = self.inner.lock();
        let bag = inner
            .data
            .entry(self.flash_name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !bag.is_object() {
            *bag = Value::Object(Map::new());
        }
        if let Value::Object(messages) = bag {
            messages.insert(key.to_string(), value.into());
        }
    }

    /// Returns and removes a flashed value. `None` when nothing was flashed under `key`.
    pub fn get_flash(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let Value::Object(messages) = inner.data.get_mut(self.flash_name.as_ref())? else {
            return None;
        };
        let value = messages.remove(key);
        if messages.is_empty() {
            inner.data.remove(self.flash_name.as_ref());
        }
        value
    }
}

/// Session Extractor
///
/// Handlers and middleware downstream of `start_session` pull the request's session from the
/// request extensions. A missing session is a wiring bug, hence 500.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            tracing::error!("session requested but the session middleware is not installed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

// 5. Lifecycle
/// SessionManager
///
/// Starts and saves sessions against a store using the configured cookie options.
#[derive(Clone)]
pub struct SessionManager {
    store: SessionStoreState,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: SessionStoreState, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStoreState {
        &self.store
    }

    /// start
    ///
    /// Resumes the session named by `cookie_id` when the store still knows it; otherwise opens
    /// a brand-new session under a server-generated id. A client-chosen id is never adopted.
    pub async fn start(&self, cookie_id: Option<&str>) -> Result<Session, SessionError> {
        if let Some(id) = cookie_id.filter(|id| !id.is_empty()) {
            if let Some(data) = self.store.load(id).await? {
                return Ok(Session::new(
                    id.to_string(),
                    data,
                    false,
                    &self.config.flash_name,
                ));
            }
        }

        Ok(Session::new(
            generate_secure_token(),
            SessionData::new(),
            true,
            &self.config.flash_name,
        ))
    }

    /// save
    ///
    /// Writes the session back with a refreshed expiry and closes it. Returns the cookie to send
    /// when the client does not hold the current id yet. Saving a closed session does nothing.
    pub async fn save(&self, session: &Session) -> Result<Option<Cookie<'static>>, SessionError> {
        let (id, data, is_new, regenerated_from) = {
            let mut inner = session.inner.lock();
            if !inner.active {
                return Ok(None);
            }
            inner.active = false;
            (
                inner.id.clone(),
                inner.data.clone(),
                inner.is_new,
                inner.regenerated_from.take(),
            )
        };

        let expires_at = chrono::Duration::from_std(self.config.lifetime)
            .ok()
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or(SessionError::LifetimeOutOfRange)?;
        self.store.store(&id, &data, expires_at).await?;

        let regenerated = regenerated_from.is_some();
        if let Some(old_id) = regenerated_from {
            self.store.destroy(&old_id).await?;
        }

        if is_new || regenerated {
            Ok(Some(self.cookie(id)))
        } else {
            Ok(None)
        }
    }

    fn cookie(&self, id: String) -> Cookie<'static> {
        let same_site = match self.config.same_site {
            SameSite::Lax => CookieSameSite::Lax,
            SameSite::Strict => CookieSameSite::Strict,
            SameSite::None => CookieSameSite::None,
        };

        Cookie::build((self.config.name.clone(), id))
            .path("/")
            .http_only(self.config.http_only)
            .secure(self.config.secure)
            .same_site(same_site)
            .build()
    }
}
