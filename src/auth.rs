use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::{
    error::AppError,
    models::{LoginCredentials, RegisterUserData, User},
    password::verify_password,
    response::redirect,
    services::UserProviderService,
    session::Session,
};

/// Session key holding the authenticated user's id.
pub const SESSION_USER_KEY: &str = "user";

/// Auth
///
/// Per-request authentication service. The current user is read from the session once and
/// memoized; clones share the memo, so the middleware and the handler of one request agree
/// without a second lookup.
#[derive(Clone)]
pub struct Auth {
    users: UserProviderService,
    session: Session,
    user: Arc<Mutex<Option<User>>>,
}

impl Auth {
    pub fn new(users: UserProviderService, session: Session) -> Self {
        Self {
            users,
            session,
            user: Arc::new(Mutex::new(None)),
        }
    }

    /// user
    ///
    /// The authenticated user, or `None` when the session carries no user id or the id no
    /// longer resolves to an account.
    pub async fn user(&self) -> Result<Option<User>, AppError> {
        let cached = self.user.lock().clone();
        if cached.is_some() {
            return Ok(cached);
        }

        let Some(user_id) = self.session.get_as::<i64>(SESSION_USER_KEY) else {
            return Ok(None);
        };

        let Some(user) = self.users.get_by_id(user_id).await? else {
            return Ok(None);
        };

        *self.user.lock() = Some(user.clone());
        Ok(Some(user))
    }

    /// attempt_login
    ///
    /// Looks the user up by email and checks the password. On success the session id is
    /// regenerated before the user id is stored, so a pre-login session id is useless after
    /// login.
    pub async fn attempt_login(&self, credentials: &LoginCredentials) -> Result<bool, AppError> {
        let Some(user) = self.users.get_by_credentials(credentials).await? else {
            tracing::debug!("login rejected: unknown email");
            return Ok(false);
        };

        if !self.check_credentials(&user, credentials) {
            tracing::debug!(user_id = user.id, "login rejected: bad password");
            return Ok(false);
        }

        self.log_in(user);
        Ok(true)
    }

    pub fn check_credentials(&self, user: &User, credentials: &LoginCredentials) -> bool {
        verify_password(&user.password, &credentials.password)
    }

    pub fn logout(&self) {
        self.session.forget(SESSION_USER_KEY);
        self.session.regenerate();
        *self.user.lock() = None;
    }

    /// Creates the account and signs it in.
    pub async fn register(&self, data: RegisterUserData) -> Result<User, AppError> {
        let user = self.users.create_user(data).await?;
        self.log_in(user.clone());
        Ok(user)
    }

    fn log_in(&self, user: User) {
        self.session.regenerate();
        self.session.put(SESSION_USER_KEY, user.id);
        tracing::info!(user_id = user.id, "user logged in");
        *self.user.lock() = Some(user);
    }
}

/// Auth Extractor
///
/// Reuses the instance installed by the `authenticate` middleware so the memo is shared;
/// otherwise builds one from the request's session.
impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
    UserProviderService: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<Auth>() {
            return Ok(auth.clone());
        }

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let auth = Auth::new(UserProviderService::from_ref(state), session);
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers behind the auth gate take this
/// as an argument; anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    UserProviderService: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let auth = Auth::from_request_parts(parts, state).await?;
        match auth.user().await {
            Ok(Some(user)) => Ok(AuthUser(user)),
            Ok(None) => Err(redirect("/login")),
            Err(e) => Err(e.into_response()),
        }
    }
}
