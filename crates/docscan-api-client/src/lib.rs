//! HTTP client for the docscan APIs.
//!
//! Two services sit behind the client: the auth API (login, registration,
//! Google exchange, account deletion) and the backend API (profiles, formats,
//! stored files, conversions). Every request carries a timeout and races an
//! optional cancellation token; non-2xx answers are turned into [`ApiError`]
//! with the server's own message when it sent one.

pub mod api;
pub mod auth;
pub mod upload;

use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use docscan_core::ClientConfig;

pub use api::google_authorize_url;
pub use auth::AuthService;
pub use docscan_core::AppError as ApiError;
pub use upload::{BatchState, PendingUploads, UploadBatch, UploadOrchestrator};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Which service a path is relative to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    Auth,
    Backend,
}

/// HTTP client for the docscan APIs with optional bearer auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    auth_base_url: String,
    backend_base_url: String,
    timeout: Duration,
    bearer: Option<String>,
    cancel: Option<CancellationToken>,
}

impl ApiClient {
    pub fn new(auth_base_url: &str, backend_base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            auth_base_url: auth_base_url.trim_end_matches('/').to_string(),
            backend_base_url: backend_base_url.trim_end_matches('/').to_string(),
            timeout,
            bearer: None,
            cancel: None,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            &config.auth_api_base_url,
            &config.backend_api_base_url,
            config.request_timeout,
        )
    }

    /// Copy of this client that sends `Authorization: Bearer <token>`.
    pub fn with_bearer(&self, token: Option<String>) -> Self {
        Self {
            bearer: token,
            ..self.clone()
        }
    }

    /// Copy of this client whose requests abort when `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_bearer(&self) -> bool {
        self.bearer.is_some()
    }

    pub fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth_base_url,
            Service::Backend => &self.backend_base_url,
        }
    }

    pub fn build_url(&self, service: Service, path: &str) -> String {
        format!("{}{}", self.base_url(service), path)
    }

    fn request(&self, method: Method, service: Service, path: &str) -> RequestBuilder {
        let url = self.build_url(service, path);
        let request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.bearer {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request and return the body of a 2xx response.
    ///
    /// The timeout covers both the send and the body read.
    async fn execute(&self, request: RequestBuilder) -> Result<Bytes> {
        let exchange = async {
            let response = request.send().await.map_err(|e| self.transport_error(e))?;
            let status = response.status();
            let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
            if !status.is_success() {
                return Err(error_from_response(status.as_u16(), &body));
            }
            Ok::<Bytes, ApiError>(body)
        };

        let timed = tokio::time::timeout(self.timeout, exchange);
        let outcome = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => return Err(ApiError::Cancelled),
                    outcome = timed => outcome,
                }
            }
            None => timed.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }

    async fn send_logged(
        &self,
        method: Method,
        service: Service,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Bytes> {
        tracing::debug!(%method, ?service, path, "API request");
        let result = self.execute(request).await;
        if let Err(e) = &result {
            tracing::warn!(%method, ?service, path, error = %e, "API request failed");
        }
        result
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self.request(Method::GET, service, path);
        if !query.is_empty() {
            request = request.query(query);
        }
        let body = self.send_logged(Method::GET, service, path, request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// GET request returning the raw body (PDF exports, previews).
    pub async fn get_bytes(&self, service: Service, path: &str) -> Result<Bytes> {
        let request = self.request(Method::GET, service, path);
        self.send_logged(Method::GET, service, path, request).await
    }

    /// GET request returning the body as text.
    pub async fn get_text(&self, service: Service, path: &str) -> Result<String> {
        let body = self.get_bytes(service, path).await?;
        String::from_utf8(body.to_vec())
            .map_err(|e| ApiError::Decode(format!("Response is not UTF-8: {}", e)))
    }

    /// Send a JSON body with `method` and deserialize the JSON response.
    pub async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(method.clone(), service, path).json(body);
        let body = self.send_logged(method, service, path, request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Send a JSON body with `method`, ignoring whatever the server answers.
    pub async fn send_json_discard<B: Serialize + ?Sized>(
        &self,
        method: Method,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let request = self.request(method.clone(), service, path).json(body);
        self.send_logged(method, service, path, request).await?;
        Ok(())
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(Method::POST, service, path, body).await
    }

    /// PUT a raw text body (editor documents).
    pub async fn put_text(&self, service: Service, path: &str, body: String) -> Result<()> {
        let request = self
            .request(Method::PUT, service, path)
            .header("Content-Type", "application/json")
            .body(body);
        self.send_logged(Method::PUT, service, path, request).await?;
        Ok(())
    }

    /// DELETE request; the response body is ignored.
    pub async fn delete(&self, service: Service, path: &str) -> Result<()> {
        let request = self.request(Method::DELETE, service, path);
        self.send_logged(Method::DELETE, service, path, request).await?;
        Ok(())
    }
}

/// Error for a non-2xx response: the first non-empty `message`, `error` or
/// `detail` string of a JSON body, else `HTTP <status>`.
pub fn error_from_response(status: u16, body: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error", "detail"].iter().find_map(|key| {
                value
                    .get(*key)
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("HTTP {}", status));
    ApiError::from_status(status, message)
}
