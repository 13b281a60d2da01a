//! Per-endpoint request validators.
use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{CategoryData, FormData, LoginCredentials, RegisterUserData},
    repository::RepositoryState,
    validation::Validator,
};

/// Longest category name accepted.
pub const CATEGORY_NAME_MAX: usize = 50;

/// Error on `email` when an account already uses that address.
pub const EMAIL_TAKEN: &str = "User with the given email address already exists";

/// RequestValidator
///
/// Checks one endpoint's submitted fields and turns them into a typed value. Failures come back
/// as `AppError::Validation` listing every offending field.
#[async_trait]
pub trait RequestValidator: Send + Sync + Sized {
    type Output: Send;

    fn build(repo: RepositoryState) -> Self;

    async fn validate(&self, data: FormData) -> Result<Self::Output, AppError>;
}

/// RequestValidatorFactory
///
/// Hands out validators wired to the shared repository:
/// `factory.make::<UserLoginRequestValidator>().validate(form).await?`.
#[derive(Clone)]
pub struct RequestValidatorFactory {
    repo: RepositoryState,
}

impl RequestValidatorFactory {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub fn make<V: RequestValidator>(&self) -> V {
        V::build(self.repo.clone())
    }
}

fn take(data: &mut FormData, field: &str) -> String {
    data.remove(field).unwrap_or_default()
}

pub struct UserLoginRequestValidator;

#[async_trait]
impl RequestValidator for UserLoginRequestValidator {
    type Output = LoginCredentials;

    fn build(_repo: RepositoryState) -> Self {
        Self
    }

    async fn validate(&self, mut data: FormData) -> Result<Self::Output, AppError> {
        Validator::new(&data)
            .required(&["email", "password"])
            .email("email")
            .validate()?;

        Ok(LoginCredentials {
            email: take(&mut data, "email"),
            password: take(&mut data, "password"),
        })
    }
}

/// RegisterUserRequestValidator
///
/// Besides the field rules, rejects an email address that already has an account.
pub struct RegisterUserRequestValidator {
    repo: RepositoryState,
}

#[async_trait]
impl RequestValidator for RegisterUserRequestValidator {
    type Output = RegisterUserData;

    fn build(repo: RepositoryState) -> Self {
        Self { repo }
    }

    async fn validate(&self, mut data: FormData) -> Result<Self::Output, AppError> {
        let mut validator = Validator::new(&data)
            .label("confirmPassword", "Confirm Password")
            .required(&["name", "email", "password", "confirmPassword"])
            .email("email")
            .equals("confirmPassword", "password");

        if !validator.has_errors("email") {
            let email = data.get("email").map(String::as_str).unwrap_or_default();
            if self.repo.count_users_by_email(email).await? > 0 {
                validator.add_error("email", EMAIL_TAKEN.to_string());
            }
        }
        validator.validate()?;

        Ok(RegisterUserData {
            name: take(&mut data, "name"),
            email: take(&mut data, "email"),
            password: take(&mut data, "password"),
        })
    }
}

fn validate_category(data: &FormData) -> Result<(), AppError> {
    Validator::new(data)
        .required(&["name"])
        .length_max("name", CATEGORY_NAME_MAX)
        .validate()?;
    Ok(())
}

pub struct CreateCategoryRequestValidator;

#[async_trait]
impl RequestValidator for CreateCategoryRequestValidator {
    type Output = CategoryData;

    fn build(_repo: RepositoryState) -> Self {
        Self
    }

    async fn validate(&self, mut data: FormData) -> Result<Self::Output, AppError> {
        validate_category(&data)?;
        Ok(CategoryData {
            name: take(&mut data, "name"),
        })
    }
}

pub struct UpdateCategoryRequestValidator;

#[async_trait]
impl RequestValidator for UpdateCategoryRequestValidator {
    type Output = CategoryData;

    fn build(_repo: RepositoryState) -> Self {
        Self
    }

    async fn validate(&self, mut data: FormData) -> Result<Self::Output, AppError> {
        validate_category(&data)?;
        Ok(CategoryData {
            name: take(&mut data, "name"),
        })
    }
}
