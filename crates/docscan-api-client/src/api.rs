//! Domain methods for the docscan APIs.
//!
//! Request and response records live in `docscan_core::models`.

use bytes::Bytes;
use reqwest::Method;

use crate::{ApiClient, Result, Service};
use docscan_core::models::{
    AdminEntry, AdminUpdate, AuthResponse, AvailableModel, Credentials, Format, NewFormat,
    NewStoredFile, PasswordChange, ProfileUpdate, RegisterRequest, StoredFile, UserProfile,
};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Consent-screen URL for the Google authorization-code flow.
pub fn google_authorize_url(client_id: &str, redirect_uri: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=online&prompt=select_account",
        GOOGLE_AUTHORIZE_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode("openid email profile"),
    )
}

impl ApiClient {
    // ---- auth service ----

    #[tracing::instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.post_json(Service::Auth, "/users/login", credentials)
            .await
    }

    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.post_json(Service::Auth, "/users/register", request)
            .await
    }

    /// Exchange a Google authorization code for a session token.
    #[tracing::instrument(skip(self, code))]
    pub async fn exchange_google_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthResponse> {
        let body = serde_json::json!({ "code": code, "redirect_uri": redirect_uri });
        self.post_json(Service::Auth, "/auth/google", &body).await
    }

    pub async fn update_password(&self, change: &PasswordChange) -> Result<()> {
        self.send_json_discard(Method::PUT, Service::Auth, "/users/update_password", change)
            .await
    }

    pub async fn delete_account(&self) -> Result<()> {
        self.delete(Service::Auth, "/users/delete_account").await
    }

    // ---- users ----

    pub async fn get_user(&self, user_id: i64) -> Result<UserProfile> {
        self.get(Service::Backend, &format!("/users/{}", user_id), &[])
            .await
    }

    pub async fn update_user(&self, user_id: i64, update: &ProfileUpdate) -> Result<UserProfile> {
        self.send_json(
            Method::PATCH,
            Service::Backend,
            &format!("/users/{}", user_id),
            update,
        )
        .await
    }

    // ---- formats and admins ----

    pub async fn list_formats(&self) -> Result<Vec<Format>> {
        self.get(Service::Backend, "/formats", &[]).await
    }

    pub async fn create_format(&self, format: &NewFormat) -> Result<Format> {
        self.post_json(Service::Backend, "/formats", format).await
    }

    pub async fn delete_format(&self, format_id: i64) -> Result<()> {
        self.delete(Service::Backend, &format!("/formats/{}", format_id))
            .await
    }

    pub async fn list_admins(&self) -> Result<Vec<AdminEntry>> {
        self.get(Service::Backend, "/admins", &[]).await
    }

    pub async fn update_admin(&self, update: &AdminUpdate) -> Result<()> {
        self.send_json_discard(Method::PUT, Service::Backend, "/admins", update)
            .await
    }

    pub async fn available_models(&self) -> Result<Vec<AvailableModel>> {
        self.get(Service::Backend, "/information/available_models", &[])
            .await
    }

    // ---- stored files ----

    pub async fn list_stored_files(&self) -> Result<Vec<StoredFile>> {
        self.get(Service::Backend, "/stored_files", &[]).await
    }

    pub async fn list_stored_files_by_owner(&self, owner_id: i64) -> Result<Vec<StoredFile>> {
        self.get(
            Service::Backend,
            &format!("/stored_files/owner/{}", owner_id),
            &[],
        )
        .await
    }

    pub async fn get_stored_file(&self, file_id: i64) -> Result<StoredFile> {
        self.get(Service::Backend, &format!("/stored_files/{}", file_id), &[])
            .await
    }

    pub async fn create_stored_file(&self, file: &NewStoredFile) -> Result<StoredFile> {
        self.post_json(Service::Backend, "/stored_files", file)
            .await
    }

    pub async fn delete_stored_file(&self, file_id: i64) -> Result<()> {
        self.delete(Service::Backend, &format!("/stored_files/{}", file_id))
            .await
    }

    /// PDF bytes of a stored file.
    pub async fn export_pdf(&self, file_id: i64) -> Result<Bytes> {
        self.get_bytes(Service::Backend, &format!("/stored_files/{}/export", file_id))
            .await
    }

    pub async fn preview(&self, file_id: i64) -> Result<Bytes> {
        self.get_bytes(
            Service::Backend,
            &format!("/stored_files/{}/preview", file_id),
        )
        .await
    }

    /// Editor document (SFDT JSON text) converted from the stored DOCX.
    pub async fn docx_to_sfdt(&self, file_id: i64) -> Result<String> {
        self.get_text(
            Service::Backend,
            &format!("/stored_files/{}/convert/docx_to_sfdt", file_id),
        )
        .await
    }

    /// Save an edited document back.
    pub async fn update_sfdt(&self, file_id: i64, sfdt: String) -> Result<()> {
        self.put_text(
            Service::Backend,
            &format!("/stored_files/{}/update/sfdt", file_id),
            sfdt,
        )
        .await
    }

    pub async fn docx_to_pdf(&self, file_id: i64) -> Result<Bytes> {
        self.get_bytes(
            Service::Backend,
            &format!("/stored_files/{}/convert/docx_to_pdf", file_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_authorize_url_encodes_params() {
        let url = google_authorize_url("id-123", "http://localhost:5173/auth/google/callback");
        assert!(url.starts_with(GOOGLE_AUTHORIZE_URL));
        assert!(url.contains("client_id=id-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5173%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20email%20profile"));
    }
}
