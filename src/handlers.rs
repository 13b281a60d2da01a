use axum::{
    Form,
    extract::{Path, State},
    response::{Html, Response},
};
use serde_json::json;

use crate::{
    auth::{Auth, AuthUser},
    error::AppError,
    models::{CategoryData, CategoryResponse, FormData},
    request_validators::{
        CreateCategoryRequestValidator, RegisterUserRequestValidator, RequestValidator,
        RequestValidatorFactory, UpdateCategoryRequestValidator, UserLoginRequestValidator,
    },
    response::{as_json, redirect},
    services::CategoryService,
    validation::ValidationError,
    views::{ViewGlobals, Views},
};

/// Field error shown when the email/password pair does not match an account.
pub const INVALID_CREDENTIALS: &str = "You have entered an invalid username or password";

// --- Home ---

/// home
///
/// [Authenticated Route] Renders the dashboard.
pub async fn home(
    State(views): State<Views>,
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
    globals: ViewGlobals,
) -> Result<Html<String>, AppError> {
    let category_count = categories.get_all(&user).await?.len();
    views.render(
        "dashboard.html",
        &globals,
        json!({ "category_count": category_count }),
    )
}

// --- Authentication ---

/// [Guest Route] Renders the login form.
pub async fn login_view(
    State(views): State<Views>,
    globals: ViewGlobals,
) -> Result<Html<String>, AppError> {
    views.render("login.html", &globals, json!({}))
}

/// [Guest Route] Renders the registration form.
pub async fn register_view(
    State(views): State<Views>,
    globals: ViewGlobals,
) -> Result<Html<String>, AppError> {
    views.render("register.html", &globals, json!({}))
}

/// login
///
/// [Guest Route] Validates the form and signs the user in. Unknown emails and wrong passwords
/// are reported the same way, as an error on the `password` field.
pub async fn login(
    State(validators): State<RequestValidatorFactory>,
    auth: Auth,
    Form(data): Form<FormData>,
) -> Result<Response, AppError> {
    let credentials = validators
        .make::<UserLoginRequestValidator>()
        .validate(data.clone())
        .await?;

    if !auth.attempt_login(&credentials).await? {
        return Err(ValidationError::field("password", INVALID_CREDENTIALS, data).into());
    }

    Ok(redirect("/"))
}

/// register
///
/// [Guest Route] Creates the account, signs it in and sends the user to the dashboard.
pub async fn register(
    State(validators): State<RequestValidatorFactory>,
    auth: Auth,
    Form(data): Form<FormData>,
) -> Result<Response, AppError> {
    let data = validators
        .make::<RegisterUserRequestValidator>()
        .validate(data)
        .await?;
    auth.register(data).await?;

    Ok(redirect("/"))
}

/// [Authenticated Route] Ends the session's login.
pub async fn logout(auth: Auth) -> Response {
    auth.logout();
    redirect("/")
}

// --- Categories ---

/// categories_index
///
/// [Authenticated Route] Lists the user's categories next to the create form.
pub async fn categories_index(
    State(views): State<Views>,
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
    globals: ViewGlobals,
) -> Result<Html<String>, AppError> {
    let categories = categories.get_all(&user).await?;
    views.render(
        "categories/index.html",
        &globals,
        json!({ "categories": categories }),
    )
}

/// [Authenticated Route] Creates a category and returns to the list.
pub async fn categories_store(
    State(validators): State<RequestValidatorFactory>,
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
    Form(data): Form<FormData>,
) -> Result<Response, AppError> {
    let data = validators
        .make::<CreateCategoryRequestValidator>()
        .validate(data)
        .await?;
    categories.create(&data.name, &user).await?;

    Ok(redirect("/categories"))
}

/// categories_delete
///
/// [Authenticated Route] Deletes one of the user's categories. Ids owned by other users answer
/// 404, exactly like ids that do not exist.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 302, description = "Deleted, redirects to /categories"),
        (status = 403, description = "CSRF check failed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn categories_delete(
    Path(id): Path<i64>,
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
) -> Result<Response, AppError> {
    if !categories.delete(id, &user).await? {
        return Err(AppError::NotFound(format!("category {id}")));
    }
    Ok(redirect("/categories"))
}

/// categories_get
///
/// [Authenticated Route] A single category as JSON.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn categories_get(
    Path(id): Path<i64>,
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
) -> Result<Response, AppError> {
    let category = categories
        .get_by_id(id, &user)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))?;

    as_json(&CategoryResponse::from(&category))
}

/// categories_update
///
/// [Authenticated Route] Renames a category and returns the updated JSON.
#[utoipa::path(
    post,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category id")),
    request_body(content = CategoryData, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Updated", body = CategoryResponse),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn categories_update(
    Path(id): Path<i64>,
    State(validators): State<RequestValidatorFactory>,
    State(categories): State<CategoryService>,
    AuthUser(user): AuthUser,
    Form(data): Form<FormData>,
) -> Result<Response, AppError> {
    let data = validators
        .make::<UpdateCategoryRequestValidator>()
        .validate(data)
        .await?;
    let category = categories
        .update(id, &data.name, &user)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))?;

    as_json(&CategoryResponse::from(&category))
}

// --- Operational ---

/// health
///
/// [Public Route] Liveness probe for load balancers.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}
