//! Login, registration and profile form checks.
//!
//! Failures are reported per field and never reach the network.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !EMAIL_RE.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.trim().is_empty() {
        return Err("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_name(label: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

/// Field name to message, in the order the fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(&'static str, String)>);

impl FieldErrors {
    fn check(&mut self, field: &'static str, result: Result<(), String>) {
        if let Err(msg) = result {
            self.0.push((field, msg));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, msg)| msg.as_str())
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            return Ok(());
        }
        let joined = self
            .0
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg))
            .collect::<Vec<_>>()
            .join("; ");
        Err(AppError::Validation(joined))
    }
}

#[derive(Debug, Clone)]
pub struct LoginForm<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

impl LoginForm<'_> {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        errors.check("email", validate_email(self.email));
        errors.check("password", validate_password(self.password));
        errors
    }
}

#[derive(Debug, Clone)]
pub struct RegisterForm<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
}

impl RegisterForm<'_> {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        errors.check("email", validate_email(self.email));
        errors.check("password", validate_password(self.password));
        if self.password != self.confirm_password {
            errors.check(
                "confirm_password",
                Err("Passwords do not match".to_string()),
            );
        }
        errors
    }
}
