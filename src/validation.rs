//! Field validation rules and the structured error they produce.
use regex::Regex;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    sync::LazyLock,
};
use thiserror::Error;

use crate::models::FormData;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex is valid")
});

/// Field name -> messages, ordered by field so rendering is stable.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Fields never echoed back into forms.
pub const SENSITIVE_FIELDS: [&str; 2] = ["password", "confirmPassword"];

/// ValidationError
///
/// Raised by request validators. Carries the messages per field and the input that produced
/// them, so the failure can be replayed into the form on the next page load.
#[derive(Debug, Clone, Error, Serialize)]
#[error("validation failed for {} field(s)", .errors.len())]
pub struct ValidationError {
    pub errors: FieldErrors,
    #[serde(skip)]
    pub input: FormData,
}

impl ValidationError {
    pub fn new(errors: FieldErrors, input: FormData) -> Self {
        Self { errors, input }
    }

    /// A single-field failure, e.g. rejected credentials after the form itself was valid.
    pub fn field(field: &str, message: impl Into<String>, input: FormData) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self { errors, input }
    }

    /// The submitted input minus password fields.
    pub fn old_input(&self) -> BTreeMap<String, String> {
        self.input
            .iter()
            .filter(|(key, _)| !SENSITIVE_FIELDS.contains(&key.as_str()))
            .filter(|(key, _)| !key.starts_with("csrf_"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Validator
///
/// A small rule runner. Rules other than `required` skip fields that are absent or blank, so a
/// missing value yields only the "is required" message.
pub struct Validator<'a> {
    data: &'a FormData,
    labels: HashMap<String, String>,
    errors: FieldErrors,
}

impl<'a> Validator<'a> {
    pub fn new(data: &'a FormData) -> Self {
        Self {
            data,
            labels: HashMap::new(),
            errors: FieldErrors::new(),
        }
    }

    pub fn label(mut self, field: &str, label: &str) -> Self {
        self.labels.insert(field.to_string(), label.to_string());
        self
    }

    pub fn required(mut self, fields: &[&str]) -> Self {
        for field in fields {
            if self.value(field).is_none() {
                let message = format!("{} is required", self.label_for(field));
                self.add_error(field, message);
            }
        }
        self
    }

    pub fn email(mut self, field: &str) -> Self {
        if let Some(value) = self.value(field) {
            if !EMAIL_REGEX.is_match(value) {
                let message = format!("{} is not a valid email address", self.label_for(field));
                self.add_error(field, message);
            }
        }
        self
    }

    pub fn length_max(mut self, field: &str, max: usize) -> Self {
        if let Some(value) = self.value(field) {
            if value.chars().count() > max {
                let message = format!("{} must not exceed {max} characters", self.label_for(field));
                self.add_error(field, message);
            }
        }
        self
    }

    /// `field` must hold the same value as `other`.
    pub fn equals(mut self, field: &str, other: &str) -> Self {
        if let Some(value) = self.value(field) {
            if self.data.get(other).map(String::as_str) != Some(value) {
                let message = format!(
                    "{} must be the same as '{}'",
                    self.label_for(field),
                    self.labels.get(other).map(String::as_str).unwrap_or(other)
                );
                self.add_error(field, message);
            }
        }
        self
    }

    /// Custom predicate over a present value.
    pub fn rule(mut self, field: &str, check: impl FnOnce(&str) -> bool, message: &str) -> Self {
        if let Some(value) = self.value(field) {
            if !check(value) {
                self.add_error(field, message.to_string());
            }
        }
        self
    }

    pub fn add_error(&mut self, field: &str, message: String) {
        self.errors.entry(field.to_string()).or_default().push(message);
    }

    pub fn has_errors(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Finishes validation, handing back the rule failures (if any) with the input.
    pub fn validate(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.errors, self.data.clone()))
        }
    }

    fn value(&self, field: &str) -> Option<&'a str> {
        self.data
            .get(field)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    fn label_for(&self, field: &str) -> String {
        self.labels
            .get(field)
            .cloned()
            .unwrap_or_else(|| default_label(field))
    }
}

// "first_name" -> "First Name"
fn default_label(field: &str) -> String {
    field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
