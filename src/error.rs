//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{response::as_json_with_status, session::SessionError, validation::ValidationError};

/// Application error types surfaced by handlers and services.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// ValidationFailure
///
/// Response extension left behind by a validation error. The validation-exception middleware
/// picks it up to flash errors and old input and redirect back to the form.
#[derive(Clone, Debug)]
pub struct ValidationFailure(pub ValidationError);

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client; internals stay in the logs.
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Validation(_) => "The given data was invalid".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            _ => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.sanitized_message();

        match self {
            AppError::Validation(error) => {
                let body = serde_json::json!({ "errors": &error.errors });
                let mut response =
                    as_json_with_status(status, &body).unwrap_or_else(IntoResponse::into_response);
                response.extensions_mut().insert(ValidationFailure(error));
                response
            }
            AppError::NotFound(_) => (status, message).into_response(),
            other => {
                tracing::error!(error = %other, "request failed");
                (status, message).into_response()
            }
        }
    }
}
