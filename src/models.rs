use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A registered account, stored in the `users` table. The `password` column holds an Argon2
/// PHC string and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category
///
/// A spending category owned by exactly one user (`categories` table). Every query against
/// this table is scoped by `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// Raw submitted form fields, keyed by input name. Validators consume this shape.
pub type FormData = HashMap<String, String>;

/// Credentials checked by `Auth::attempt_login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// RegisterUserData
///
/// Validated registration input. The password is plain text here and gets hashed by the
/// user provider before it reaches the repository.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserData {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// New user row handed to the repository, password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Validated category form (create and update share the shape).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CategoryData {
    #[schema(example = "Groceries", max_length = 50)]
    pub name: String,
}

// --- Response Schemas (Output) ---

/// CategoryResponse
///
/// The JSON view of a category returned by `GET /categories/{id}` and `POST /categories/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CategoryResponse {
    pub id: i64,
    #[schema(example = "Groceries")]
    pub name: String,
}

impl From<&Category> for CategoryResponse {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}
