//! Validation modules

pub mod file;
pub mod form;

pub use file::{
    guess_content_type, validate, AcceptRule, AcceptRules, FileValidator, RejectReason,
    DEFAULT_ACCEPTED_TYPES,
};
pub use form::{
    validate_email, validate_name, validate_password, FieldErrors, LoginForm, RegisterForm,
    MIN_PASSWORD_LENGTH,
};
