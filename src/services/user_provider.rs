use crate::{
    error::AppError,
    models::{FormData, LoginCredentials, NewUser, RegisterUserData, User},
    password::hash_password,
    repository::RepositoryState,
    request_validators::EMAIL_TAKEN,
    validation::ValidationError,
};

/// UserProviderService
///
/// Looks users up for the auth layer and creates new accounts with hashed passwords.
#[derive(Clone)]
pub struct UserProviderService {
    repo: RepositoryState,
}

impl UserProviderService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn get_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        Ok(self.repo.get_user(user_id).await?)
    }

    /// Finds the account the credentials claim to belong to. The password is not checked here.
    pub async fn get_by_credentials(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<Option<User>, AppError> {
        Ok(self.repo.get_user_by_email(&credentials.email).await?)
    }

    /// create_user
    ///
    /// Hashes the password and inserts the account. Losing a race against another registration
    /// for the same email comes back as the same `email` field error the validator reports.
    pub async fn create_user(&self, data: RegisterUserData) -> Result<User, AppError> {
        let password_hash =
            hash_password(&data.password).map_err(|e| AppError::Internal(e.to_string()))?;

        let new_user = NewUser {
            name: data.name.clone(),
            email: data.email.clone(),
            password_hash,
        };
        let user = match self.repo.create_user(new_user).await {
            Ok(user) => user,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::warn!(email = %data.email, "registration lost a duplicate email race");
                let input = FormData::from([
                    ("name".to_string(), data.name),
                    ("email".to_string(), data.email),
                ]);
                return Err(ValidationError::field("email", EMAIL_TAKEN, input).into());
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }
}
