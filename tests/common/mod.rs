//! Shared test fixtures: an in-memory repository and a cookie-keeping client for the router.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderValue, Method, Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use expense_tracker::{
    AppConfig, AppState, MemorySessionStore, create_router,
    models::{Category, NewUser, User},
    password::hash_password,
    repository::{RepoResult, Repository, RepositoryState},
    session::SessionStoreState,
};
use parking_lot::Mutex;
use sqlx::error::{DatabaseError, ErrorKind};
use std::{error::Error as StdError, fmt, sync::Arc};
use tower::util::ServiceExt;

// --- In-memory Repository ---

#[derive(Default)]
struct MockData {
    users: Vec<User>,
    categories: Vec<Category>,
    next_user_id: i64,
    next_category_id: i64,
}

/// MockRepository
///
/// Keeps users and categories in memory and applies the same ownership rules as the Postgres
/// queries.
#[derive(Default)]
pub struct MockRepository {
    data: Mutex<MockData>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user whose password is `password`, hashed the way registration does it.
    pub async fn seed_user(&self, name: &str, email: &str, password: &str) -> User {
        let password_hash = hash_password(password).unwrap();
        self.create_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
        })
        .await
        .unwrap()
    }

    pub fn categories_of(&self, user_id: i64) -> Vec<Category> {
        self.data
            .lock()
            .categories
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.data.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .data
            .lock()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn count_users_by_email(&self, email: &str) -> RepoResult<i64> {
        Ok(self
            .data
            .lock()
            .users
            .iter()
            .filter(|u| u.email.eq_ignore_ascii_case(email))
            .count() as i64)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut data = self.data.lock();
        if data
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(sqlx::Error::Database(Box::new(UniqueViolation)));
        }
        data.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: data.next_user_id,
            name: user.name,
            email: user.email,
            password: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        data.users.push(user.clone());
        Ok(user)
    }

    async fn get_categories(&self, user_id: i64) -> RepoResult<Vec<Category>> {
        let mut categories = self.categories_of(user_id);
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn get_category(&self, id: i64, user_id: i64) -> RepoResult<Option<Category>> {
        Ok(self
            .data
            .lock()
            .categories
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .cloned())
    }

    async fn create_category(&self, name: &str, user_id: i64) -> RepoResult<Category> {
        let mut data = self.data.lock();
        data.next_category_id += 1;
        let now = Utc::now();
        let category = Category {
            id: data.next_category_id,
            user_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        data.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: i64,
        user_id: i64,
        name: &str,
    ) -> RepoResult<Option<Category>> {
        let mut data = self.data.lock();
        let Some(category) = data
            .categories
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id)
        else {
            return Ok(None);
        };
        category.name = name.to_string();
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: i64, user_id: i64) -> RepoResult<bool> {
        let mut data = self.data.lock();
        let before = data.categories.len();
        data.categories
            .retain(|c| !(c.id == id && c.user_id == user_id));
        Ok(data.categories.len() < before)
    }
}

/// What Postgres reports when an insert hits `users_email_lower_idx`.
#[derive(Debug)]
pub struct UniqueViolation;

impl fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("duplicate key value violates unique constraint \"users_email_lower_idx\"")
    }
}

impl StdError for UniqueViolation {}

impl DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint \"users_email_lower_idx\""
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UniqueViolation
    }
}

// --- State Assembly ---

pub struct TestApp {
    pub repo: Arc<MockRepository>,
    pub sessions: Arc<MemorySessionStore>,
    pub state: AppState,
}

pub fn test_app() -> TestApp {
    let repo = Arc::new(MockRepository::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let state = AppState::new(
        repo.clone() as RepositoryState,
        sessions.clone() as SessionStoreState,
        AppConfig::default(),
    )
    .expect("templates compile");
    TestApp {
        repo,
        sessions,
        state,
    }
}

// --- Browser-like Client ---

/// TestClient
///
/// Drives the router the way a browser would: remembers the session cookie and the CSRF pair
/// from the last rendered page, and adds both to later requests.
pub struct TestClient {
    app: Router,
    cookie: Option<String>,
    pub csrf: Option<(String, String)>,
}

impl TestClient {
    pub fn new(state: AppState) -> Self {
        Self {
            app: create_router(state),
            cookie: None,
            csrf: None,
        }
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub async fn send(&mut self, mut request: Request<Body>) -> Response {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }

        let response = self.app.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// GETs a page, returning its status and body, and picks up the CSRF pair it renders.
    pub async fn get_html(&mut self, uri: &str) -> (StatusCode, String) {
        let response = self.get(uri).await;
        let status = response.status();
        let body = body_string(response).await;
        if let (Some(name), Some(value)) = (
            hidden_input(&body, "csrf_name"),
            hidden_input(&body, "csrf_value"),
        ) {
            self.csrf = Some((name, value));
        }
        (status, body)
    }

    /// POSTs a urlencoded form, adding the CSRF fields when a page has provided them.
    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response {
        let mut fields: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some((name, value)) = &self.csrf {
            fields.push(("csrf_name".to_string(), name.clone()));
            fields.push(("csrf_value".to_string(), value.clone()));
        }

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(serde_urlencoded::to_string(&fields).unwrap()))
            .unwrap();
        self.send(request).await
    }

    /// A script-style request: CSRF pair in headers, `X-Requested-With` set. An empty `form`
    /// sends no body.
    pub async fn xhr(&mut self, method: Method, uri: &str, form: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-requested-with", "XMLHttpRequest");
        if let Some((name, value)) = &self.csrf {
            builder = builder
                .header("x-csrf-name", name.as_str())
                .header("x-csrf-value", value.as_str());
        }
        let body = if form.is_empty() {
            Body::empty()
        } else {
            builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            Body::from(serde_urlencoded::to_string(form).unwrap())
        };
        self.send(builder.body(body).unwrap()).await
    }

    /// Loads the login page and signs in.
    pub async fn login(&mut self, email: &str, password: &str) -> Response {
        self.get_html("/login").await;
        self.post_form("/login", &[("email", email), ("password", password)])
            .await
    }
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().unwrap())
        .unwrap_or("")
}

/// Value of `<input type="hidden" name="{field}" value="...">` in a rendered page.
pub fn hidden_input(html: &str, field: &str) -> Option<String> {
    let needle = format!(r#"name="{field}" value=""#);
    let start = html.find(&needle)? + needle.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}
