use crate::models::{Category, NewUser, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Result type for persistence operations.
pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// Abstract contract for all persistence operations, letting services and handlers work
/// against Postgres in production and an in-memory mock in tests.
///
/// **Send + Sync + async_trait** are required so the trait object (`Arc<dyn Repository>`)
/// can live in the shared application state.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    // Registration uniqueness check.
    async fn count_users_by_email(&self, email: &str) -> RepoResult<i64>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;

    // --- Categories (always scoped to the owner) ---
    async fn get_categories(&self, user_id: i64) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: i64, user_id: i64) -> RepoResult<Option<Category>>;
    async fn create_category(&self, name: &str, user_id: i64) -> RepoResult<Category>;
    async fn update_category(
        &self,
        id: i64,
        user_id: i64,
        name: &str,
    ) -> RepoResult<Option<Category>>;
    // Returns true only if a row owned by `user_id` was removed.
    async fn delete_category(&self, id: i64, user_id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// get_user_by_email
    ///
    /// Emails are stored as entered; the comparison is case-insensitive so `A@x.io` and
    /// `a@x.io` resolve to the same account.
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password, created_at, updated_at
               FROM users
               WHERE lower(email) = lower($1)"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn count_users_by_email(&self, email: &str) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (name, email, password, created_at, updated_at)
               VALUES ($1, $2, $3, NOW(), NOW())
               RETURNING id, name, email, password, created_at, updated_at"#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_categories(&self, user_id: i64) -> RepoResult<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            r#"SELECT id, user_id, name, created_at, updated_at
               FROM categories
               WHERE user_id = $1
               ORDER BY name ASC, id ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_category(&self, id: i64, user_id: i64) -> RepoResult<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r#"SELECT id, user_id, name, created_at, updated_at
               FROM categories
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_category(&self, name: &str, user_id: i64) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"INSERT INTO categories (user_id, name, created_at, updated_at)
               VALUES ($1, $2, NOW(), NOW())
               RETURNING id, user_id, name, created_at, updated_at"#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
    }

    /// update_category
    ///
    /// Renames a category only if `user_id` owns it; `None` covers both "missing" and
    /// "someone else's".
    async fn update_category(
        &self,
        id: i64,
        user_id: i64,
        name: &str,
    ) -> RepoResult<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r#"UPDATE categories
               SET name = $3, updated_at = NOW()
               WHERE id = $1 AND user_id = $2
               RETURNING id, user_id, name, created_at, updated_at"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_category(&self, id: i64, user_id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
