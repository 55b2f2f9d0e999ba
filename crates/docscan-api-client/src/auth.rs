//! Session-aware auth flows.
//!
//! Wraps the login, registration and Google endpoints so that a successful
//! answer lands in the [`SessionStore`], and hands out clients carrying the
//! current bearer token. The store itself never talks to the network.

use std::sync::Arc;

use crate::{ApiClient, ApiError, Result};
use docscan_core::models::{
    AuthResponse, Credentials, PasswordChange, ProfileUpdate, RegisterRequest, UserProfile,
};
use docscan_core::validation::{validate_name, validate_password, LoginForm, RegisterForm};
use docscan_core::{AuthErrorPolicy, SessionStore};

pub struct AuthService {
    client: ApiClient,
    session: Arc<SessionStore>,
    policy: AuthErrorPolicy,
}

impl AuthService {
    pub fn new(client: ApiClient, session: Arc<SessionStore>, policy: AuthErrorPolicy) -> Self {
        Self {
            client,
            session,
            policy,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Client carrying the current token, or an auth error when logged out.
    pub fn authorized_client(&self) -> Result<ApiClient> {
        match self.session.bearer() {
            Some(token) => Ok(self.client.with_bearer(Some(token))),
            None => Err(ApiError::Unauthorized {
                status: 401,
                message: "You are not logged in".to_string(),
            }),
        }
    }

    /// Logged-in user id, or an auth error when logged out.
    pub fn require_user_id(&self) -> Result<i64> {
        self.session.user_id().ok_or_else(|| ApiError::Unauthorized {
            status: 401,
            message: "You are not logged in".to_string(),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        LoginForm { email, password }.validate().into_result()?;
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = self.client.login(&credentials).await?;
        self.session.login_with(&response)?;
        Ok(response)
    }

    pub async fn register(
        &self,
        form: RegisterForm<'_>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<AuthResponse> {
        form.validate().into_result()?;
        check_names(first_name.as_deref(), last_name.as_deref())?;
        let request = RegisterRequest {
            email: form.email.trim().to_string(),
            password: form.password.to_string(),
            first_name,
            last_name,
        };
        let response = self.client.register(&request).await?;
        self.session.login_with(&response)?;
        Ok(response)
    }

    pub async fn login_with_google(&self, code: &str, redirect_uri: &str) -> Result<AuthResponse> {
        if code.trim().is_empty() {
            return Err(ApiError::Validation(
                "No code returned from Google".to_string(),
            ));
        }
        let response = self.client.exchange_google_code(code, redirect_uri).await?;
        self.session.login_with(&response)?;
        Ok(response)
    }

    pub fn logout(&self) -> Result<()> {
        self.session.logout()
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        validate_password(new_password).map_err(ApiError::Validation)?;
        let change = PasswordChange {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        let client = self.authorized_client()?;
        let result = client.update_password(&change).await;
        self.check(result)
    }

    /// Patch the logged-in user's profile. Only the names that are set are sent.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        check_names(update.first_name.as_deref(), update.last_name.as_deref())?;
        let user_id = self.require_user_id()?;
        let client = self.authorized_client()?;
        let result = client.update_user(user_id, update).await;
        self.check(result)
    }

    /// Delete the account and end the session.
    pub async fn delete_account(&self) -> Result<()> {
        let client = self.authorized_client()?;
        let result = client.delete_account().await;
        self.check(result)?;
        self.session.logout()
    }

    /// Apply the auth-error policy to an error coming back from a call made
    /// with this session's token. The error itself is always returned.
    pub fn handle_error(&self, err: ApiError) -> ApiError {
        self.observe(&err);
        err
    }

    /// Borrowing form of `handle_error`, for errors held inside upload results.
    pub fn observe(&self, err: &ApiError) {
        if err.is_auth_error() && self.policy == AuthErrorPolicy::Logout {
            tracing::info!("Server rejected the session token; logging out");
            if let Err(e) = self.session.logout() {
                tracing::warn!(error = %e, "Failed to clear session storage");
            }
        }
    }

    /// `handle_error` for a whole result.
    pub fn check<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.handle_error(e))
    }
}

fn check_names(first_name: Option<&str>, last_name: Option<&str>) -> Result<()> {
    for (label, value) in [("First name", first_name), ("Last name", last_name)] {
        if let Some(value) = value {
            validate_name(label, value).map_err(ApiError::Validation)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn service(policy: AuthErrorPolicy) -> AuthService {
        let client = ApiClient::new(
            "http://127.0.0.1:9",
            "http://127.0.0.1:9",
            Duration::from_millis(200),
        )
        .unwrap();
        AuthService::new(client, Arc::new(SessionStore::in_memory()), policy)
    }

    #[test]
    fn test_authorized_client_requires_login() {
        let auth = service(AuthErrorPolicy::Keep);
        let err = auth.authorized_client().unwrap_err();
        assert!(err.is_auth_error());

        auth.session().login("tok", 1, "a@b.io", None).unwrap();
        assert!(auth.authorized_client().unwrap().has_bearer());
        assert_eq!(auth.require_user_id().unwrap(), 1);
    }

    #[test]
    fn test_logout_policy_clears_session_on_auth_error() {
        let auth = service(AuthErrorPolicy::Logout);
        auth.session().login("tok", 1, "a@b.io", None).unwrap();

        let err = auth.handle_error(ApiError::from_status(500, "boom".to_string()));
        assert!(!err.is_auth_error());
        assert!(auth.session().is_logged_in());

        let err = auth.handle_error(ApiError::from_status(401, "expired".to_string()));
        assert!(err.is_auth_error());
        assert!(!auth.session().is_logged_in());
    }

    #[test]
    fn test_keep_policy_leaves_session() {
        let auth = service(AuthErrorPolicy::Keep);
        auth.session().login("tok", 1, "a@b.io", None).unwrap();
        auth.handle_error(ApiError::from_status(401, "expired".to_string()));
        assert!(auth.session().is_logged_in());
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_network() {
        let auth = service(AuthErrorPolicy::Keep);
        let err = auth.login("not-an-email", "123").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(!auth.session().is_logged_in());
    }

    #[tokio::test]
    async fn test_blank_name_rejected_before_request() {
        let auth = service(AuthErrorPolicy::Keep);
        auth.session().login("tok", 1, "a@b.io", None).unwrap();
        let update = ProfileUpdate {
            first_name: Some("  ".to_string()),
            last_name: None,
        };
        let err = auth.update_profile(&update).await.unwrap_err();
        assert_eq!(err.to_string(), "First name is required");
    }

    #[tokio::test]
    async fn test_google_login_requires_code() {
        let auth = service(AuthErrorPolicy::Keep);
        let err = auth.login_with_google(" ", "http://x/cb").await.unwrap_err();
        assert_eq!(err.to_string(), "No code returned from Google");
    }
}
