//! Request middleware, listed in the order the router installs them (outermost first).
//!
//! `start_session` must wrap everything else here: the others pull the request's `Session`
//! out of the extensions it fills.
use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Map, Value};

use crate::{
    auth::{Auth, AuthUser},
    csrf::{self, CsrfFields, CsrfToken},
    error::{AppError, ValidationFailure},
    models::FormData,
    response::redirect,
    services::{RequestService, request_service::PREVIOUS_URL_KEY},
    session::{Session, SessionError, SessionManager},
    views::{FlashedErrors, OldInput},
};

/// Largest form body the CSRF guard will buffer while looking for the token fields.
pub const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

/// Flash key holding the field errors of the last failed submission.
pub const ERRORS_FLASH_KEY: &str = "errors";
/// Flash key holding the sanitized input of the last failed submission.
pub const OLD_FLASH_KEY: &str = "old";

/// start_session
///
/// Opens the session named by the session cookie (or a fresh one), exposes it to everything
/// downstream, then saves it once the response is ready and attaches the cookie when the
/// client needs a new one.
pub async fn start_session(
    State(manager): State<SessionManager>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if request
        .extensions()
        .get::<Session>()
        .is_some_and(Session::is_active)
    {
        return AppError::from(SessionError::AlreadyStarted).into_response();
    }

    let cookie_id = jar
        .get(&manager.config().name)
        .map(|cookie| cookie.value().to_string());
    let session = match manager.start(cookie_id.as_deref()).await {
        Ok(session) => session,
        Err(e) => return AppError::from(e).into_response(),
    };
    request.extensions_mut().insert(session.clone());

    let remember_url = request.method() == Method::GET && !RequestService::is_xhr(request.headers());
    let uri = request
        .uri()
        .path_and_query()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let response = next.run(request).await;

    if remember_url && response.status().is_success() {
        session.put(PREVIOUS_URL_KEY, uri);
    }

    match manager.save(&session).await {
        Ok(Some(cookie)) => (jar.add(cookie), response).into_response(),
        Ok(None) => response,
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Moves flashed old input into the request for the views.
pub async fn old_form_data(session: Session, mut request: Request, next: Next) -> Response {
    if let Some(old) = session.get_flash(OLD_FLASH_KEY) {
        request.extensions_mut().insert(OldInput(old));
    }
    next.run(request).await
}

/// Moves flashed validation errors into the request for the views.
pub async fn validation_errors(session: Session, mut request: Request, next: Next) -> Response {
    if let Some(errors) = session.get_flash(ERRORS_FLASH_KEY) {
        request.extensions_mut().insert(FlashedErrors(errors));
    }
    next.run(request).await
}

/// validation_exception
///
/// Turns a `ValidationFailure` left on the response into flash data plus a redirect back to
/// the form. Script-issued requests keep the `422` JSON body instead.
pub async fn validation_exception(session: Session, request: Request, next: Next) -> Response {
    let headers = request.headers().clone();
    let uri = request.uri().clone();
    let mut response = next.run(request).await;

    let Some(ValidationFailure(error)) = response.extensions_mut().remove::<ValidationFailure>()
    else {
        return response;
    };

    if RequestService::is_xhr(&headers) {
        return response;
    }

    let errors: Map<String, Value> = error
        .errors
        .iter()
        .map(|(field, messages)| (field.clone(), Value::from(messages.clone())))
        .collect();
    let old: Map<String, Value> = error
        .old_input()
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect();

    session.flash(ERRORS_FLASH_KEY, Value::Object(errors));
    session.flash(OLD_FLASH_KEY, Value::Object(old));

    let target = RequestService::get_referer(&headers, &uri, &session);
    tracing::debug!(fields = error.errors.len(), %target, "validation failed, redirecting back");
    redirect(&target)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

/// csrf_guard
///
/// Rejects state-changing requests whose token pair does not match the session's. The pair
/// is read from the `X-CSRF-*` headers, falling back to the form fields; a buffered form body
/// is handed on unchanged.
pub async fn csrf_guard(session: Session, request: Request, next: Next) -> Response {
    if !csrf::requires_token(request.method()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let mut name = header_value(&parts.headers, csrf::NAME_HEADER);
    let mut value = header_value(&parts.headers, csrf::VALUE_HEADER);

    let body = if name.is_some() && value.is_some() {
        body
    } else {
        let bytes = match to_bytes(body, MAX_FORM_BYTES).await {
            Ok(bytes) => bytes,
            Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
        };
        if is_form(&parts.headers) {
            let mut fields: FormData = serde_urlencoded::from_bytes(&bytes).unwrap_or_default();
            name = name.or_else(|| fields.remove(csrf::NAME_KEY));
            value = value.or_else(|| fields.remove(csrf::VALUE_KEY));
        }
        Body::from(bytes)
    };

    match (name, value) {
        (Some(name), Some(value)) if CsrfToken::verify(&session, &name, &value) => {
            next.run(Request::from_parts(parts, body)).await
        }
        _ => {
            tracing::warn!(method = %parts.method, uri = %parts.uri, "csrf check failed");
            csrf::failure_response()
        }
    }
}

/// Exposes the session's token pair to the views as `csrf`.
pub async fn csrf_fields(session: Session, mut request: Request, next: Next) -> Response {
    let fields = CsrfFields::from(CsrfToken::for_session(&session));
    request.extensions_mut().insert(fields);
    next.run(request).await
}

/// authenticate
///
/// Resolves the session's user once per request and, when there is one, stores it as an
/// `AuthUser` extension for the gates, the handlers and the views.
pub async fn authenticate(auth: Auth, mut request: Request, next: Next) -> Response {
    match auth.user().await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser(user));
        }
        Ok(None) => {}
        Err(e) => return e.into_response(),
    }
    next.run(request).await
}

/// require_auth
///
/// Gate for member-only routes. The `AuthUser` extractor redirects anonymous requests to
/// `/login` before the handler runs.
pub async fn require_auth(_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// Gate for the login and register pages: signed-in users go to the dashboard.
pub async fn guest(auth: Auth, request: Request, next: Next) -> Response {
    match auth.user().await {
        Ok(Some(_)) => redirect("/"),
        Ok(None) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
