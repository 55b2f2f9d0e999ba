//! Configuration module
//!
//! Client settings read once at start-up from the environment (and a `.env`
//! file when present). Invalid numeric values fall back to their defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::validation::{AcceptRules, FileValidator};

const AUTH_API_BASE_URL: &str = "http://localhost:8000";
const BACKEND_API_BASE_URL: &str = "http://localhost:8080/api/v1";
const MAX_UPLOAD_MB: f64 = 25.0;
const REQUEST_TIMEOUT_MS: u64 = 60_000;
const FLASH_TIMEOUT_MS: u64 = 3000;
const SESSION_FILE_NAME: &str = "docscan-session.json";

/// What to do with the stored session when the server rejects its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthErrorPolicy {
    /// Surface the error and leave the session alone.
    #[default]
    Keep,
    /// Surface the error and log out, so the next command asks for a login.
    Logout,
}

impl FromStr for AuthErrorPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" | "" => Ok(AuthErrorPolicy::Keep),
            "logout" => Ok(AuthErrorPolicy::Logout),
            other => Err(AppError::Config(format!(
                "AUTH_ERROR_POLICY must be 'keep' or 'logout', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub auth_api_base_url: String,
    pub backend_api_base_url: String,
    pub google_client_id: Option<String>,
    pub max_upload_bytes: u64,
    pub accepted_types: AcceptRules,
    pub request_timeout: Duration,
    pub flash_timeout: Duration,
    pub session_file: PathBuf,
    pub auth_error_policy: AuthErrorPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_api_base_url: AUTH_API_BASE_URL.to_string(),
            backend_api_base_url: BACKEND_API_BASE_URL.to_string(),
            google_client_id: None,
            max_upload_bytes: megabytes_to_bytes(MAX_UPLOAD_MB),
            accepted_types: AcceptRules::default_accepted(),
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            flash_timeout: Duration::from_millis(FLASH_TIMEOUT_MS),
            session_file: env::temp_dir().join(SESSION_FILE_NAME),
            auth_error_policy: AuthErrorPolicy::Keep,
        }
    }
}

/// Whole bytes for a megabyte figure; non-finite or non-positive input uses the default.
pub fn megabytes_to_bytes(mb: f64) -> u64 {
    let safe = if mb.is_finite() && mb > 0.0 {
        mb
    } else {
        MAX_UPLOAD_MB
    };
    (safe * 1024.0 * 1024.0).floor() as u64
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_upload_bytes = lookup("MAX_UPLOAD_MB")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(megabytes_to_bytes)
            .unwrap_or(defaults.max_upload_bytes);

        let accepted_types = match lookup("ACCEPTED_FILE_TYPES") {
            Some(list) => AcceptRules::parse_list(&list),
            None => defaults.accepted_types,
        };

        let request_timeout = lookup("REQUEST_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout);

        let flash_timeout = lookup("FLASH_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.flash_timeout);

        let auth_error_policy = match lookup("AUTH_ERROR_POLICY") {
            Some(raw) => raw.parse()?,
            None => AuthErrorPolicy::default(),
        };

        let config = Self {
            auth_api_base_url: lookup("AUTH_API_BASE_URL")
                .map(trim_base_url)
                .unwrap_or(defaults.auth_api_base_url),
            backend_api_base_url: lookup("BACKEND_API_BASE_URL")
                .map(trim_base_url)
                .unwrap_or(defaults.backend_api_base_url),
            google_client_id: lookup("GOOGLE_CLIENT_ID").filter(|s| !s.trim().is_empty()),
            max_upload_bytes,
            accepted_types,
            request_timeout,
            flash_timeout,
            session_file: lookup("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
            auth_error_policy,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for (key, url) in [
            ("AUTH_API_BASE_URL", &self.auth_api_base_url),
            ("BACKEND_API_BASE_URL", &self.backend_api_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    key, url
                )));
            }
        }
        Ok(())
    }

    pub fn file_validator(&self) -> FileValidator {
        FileValidator::new(self.accepted_types.clone(), self.max_upload_bytes)
    }
}
