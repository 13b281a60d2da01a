//! CSRF token issuance and verification.
//!
//! Each session carries one persistent name/value pair. Forms echo it back in the
//! `csrf_name`/`csrf_value` fields; script-issued requests may send the
//! `X-CSRF-Name`/`X-CSRF-Value` headers instead.
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{session::Session, token::generate_secure_token};

/// Form field carrying the token name.
pub const NAME_KEY: &str = "csrf_name";
/// Form field carrying the token value.
pub const VALUE_KEY: &str = "csrf_value";
pub const NAME_HEADER: &str = "x-csrf-name";
pub const VALUE_HEADER: &str = "x-csrf-value";

const SESSION_KEY: &str = "csrf";

/// The token pair stored in the session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsrfToken {
    pub name: String,
    pub value: String,
}

impl CsrfToken {
    fn generate() -> Self {
        Self {
            name: format!("csrf{}", Uuid::new_v4().simple()),
            value: generate_secure_token(),
        }
    }

    /// Returns the session's token, minting and storing one on first use.
    pub fn for_session(session: &Session) -> Self {
        if let Some(token) = session.get_as::<CsrfToken>(SESSION_KEY) {
            return token;
        }
        let token = Self::generate();
        session.put(
            SESSION_KEY,
            serde_json::json!({ "name": token.name, "value": token.value }),
        );
        token
    }

    /// Checks a submitted pair against the session's token. Sessions that never issued a
    /// token reject everything.
    pub fn verify(session: &Session, name: &str, value: &str) -> bool {
        let Some(token) = session.get_as::<CsrfToken>(SESSION_KEY) else {
            return false;
        };
        let name_ok = token.name.as_bytes().ct_eq(name.as_bytes());
        let value_ok = token.value.as_bytes().ct_eq(value.as_bytes());
        (name_ok & value_ok).into()
    }
}

/// Methods that change state and therefore need a valid token.
pub fn requires_token(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Response sent when verification fails.
pub fn failure_response() -> Response {
    (StatusCode::FORBIDDEN, "Failed CSRF check!").into_response()
}

#[derive(Clone, Debug, Serialize)]
pub struct CsrfKeys {
    pub name: &'static str,
    pub value: &'static str,
}

/// CsrfFields
///
/// What the views need to render hidden token inputs:
/// `<input name="{{ csrf.keys.name }}" value="{{ csrf.name }}">`.
#[derive(Clone, Debug, Serialize)]
pub struct CsrfFields {
    pub keys: CsrfKeys,
    pub name: String,
    pub value: String,
}

impl From<CsrfToken> for CsrfFields {
    fn from(token: CsrfToken) -> Self {
        Self {
            keys: CsrfKeys {
                name: NAME_KEY,
                value: VALUE_KEY,
            },
            name: token.name,
            value: token.value,
        }
    }
}
