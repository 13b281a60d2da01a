use axum::{extract::FromRequestParts, http::request::Parts, response::Html};
use minijinja::Environment;
use serde::Serialize;
use serde_json::{Map, Value};
use std::{convert::Infallible, sync::Arc};

use crate::{auth::AuthUser, csrf::CsrfFields, error::AppError, models::User};

/// Validation errors flashed by the previous request, installed by `validation_errors`.
#[derive(Clone, Debug)]
pub struct FlashedErrors(pub Value);

/// Form input flashed by the previous request, installed by `old_form_data`.
#[derive(Clone, Debug)]
pub struct OldInput(pub Value);

/// Views
///
/// The template environment. Templates are compiled into the binary so rendering never touches
/// the filesystem; `.html` templates are auto-escaped.
#[derive(Clone)]
pub struct Views {
    env: Arc<Environment<'static>>,
}

const TEMPLATES: [(&str, &str); 5] = [
    ("layout.html", include_str!("../templates/layout.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("register.html", include_str!("../templates/register.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    (
        "categories/index.html",
        include_str!("../templates/categories/index.html"),
    ),
];

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env: Arc::new(env) })
    }

    /// Renders `name` with the request globals plus a page-specific `context` object.
    /// Page keys win over globals of the same name.
    pub fn render(
        &self,
        name: &str,
        globals: &ViewGlobals,
        context: Value,
    ) -> Result<Html<String>, AppError> {
        let mut ctx = match serde_json::to_value(globals)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Value::Object(page) = context {
            ctx.extend(page);
        }

        let html = self.env.get_template(name)?.render(&ctx)?;
        Ok(Html(html))
    }
}

/// ViewGlobals
///
/// Per-request values every template can use: `csrf`, `errors`, `old` and `user`. `errors` and
/// `old` are always objects so templates can probe `errors.name` without guards.
#[derive(Clone, Debug, Serialize)]
pub struct ViewGlobals {
    pub csrf: Option<CsrfFields>,
    pub errors: Value,
    pub old: Value,
    pub user: Option<User>,
}

impl Default for ViewGlobals {
    fn default() -> Self {
        Self {
            csrf: None,
            errors: Value::Object(Map::new()),
            old: Value::Object(Map::new()),
            user: None,
        }
    }
}

fn object_or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(value @ Value::Object(_)) => value.clone(),
        _ => Value::Object(Map::new()),
    }
}

impl<S> FromRequestParts<S> for ViewGlobals
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let extensions = &parts.extensions;
        Ok(Self {
            csrf: extensions.get::<CsrfFields>().cloned(),
            errors: object_or_empty(extensions.get::<FlashedErrors>().map(|e| &e.0)),
            old: object_or_empty(extensions.get::<OldInput>().map(|o| &o.0)),
            user: extensions.get::<AuthUser>().map(|AuthUser(user)| user.clone()),
        })
    }
}
