//! Response helpers shared by handlers and middleware.
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

/// `302 Found` to `location`.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::FOUND, [(header::LOCATION, HeaderValue::from_static("/"))])
            .into_response(),
    }
}

/// as_json
///
/// Serializes `data` with the characters that matter to HTML (`<`, `>`, `&`, `'`, `"` inside
/// strings) written as `\u00XX` escapes, so the payload is inert if it ever lands in markup.
pub fn as_json<T: Serialize>(data: &T) -> Result<Response, AppError> {
    as_json_with_status(StatusCode::OK, data)
}

/// [`as_json`] with a status other than `200 OK`.
pub fn as_json_with_status<T: Serialize>(
    status: StatusCode,
    data: &T,
) -> Result<Response, AppError> {
    let body = escape_json(&serde_json::to_string(data)?);
    Ok((
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response())
}

// Outside strings, serde_json only ever emits `"` as a delimiter, so a delimiter is any quote
// not preceded by an unescaped backslash. Only quotes inside strings get rewritten.
fn escape_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            if c == '"' {
                // `\"` -> `"`
                out.pop();
                out.push_str("\\u0022");
            } else {
                out.push(c);
            }
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            _ => out.push(c),
        }
    }

    out
}
