use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;
use tokio::net::TcpListener;

use docscan_api_client::{
    ApiClient, ApiError, AuthService, BatchState, PendingUploads, UploadOrchestrator,
};
use docscan_core::models::{UploadCandidate, UploadMetadata, UploadOutcome};
use docscan_core::validation::AcceptRules;
use docscan_core::{AuthErrorPolicy, FileValidator, SessionStore};

fn client_for(url: &str) -> ApiClient {
    ApiClient::new(url, url, Duration::from_secs(5)).unwrap()
}

fn metadata() -> UploadMetadata {
    UploadMetadata {
        format_id: Some(2),
        processing_model_id: None,
        generation: 0,
        primary_file_id: None,
    }
}

fn pdf(name: &str, data: &[u8]) -> UploadCandidate {
    UploadCandidate::from_bytes(name, Some("application/pdf".to_string()), data.to_vec())
}

fn pending_queue() -> PendingUploads {
    PendingUploads::new(FileValidator::new(AcceptRules::default_accepted(), 1024))
}

/// Listener that accepts connections but never answers.
async fn silent_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

#[tokio::test]
async fn test_batch_results_attributed_by_index() {
    let mut server = Server::new_async().await;

    // "aaa" -> YWFh, "bbb" -> YmJi, "ccc" -> Y2Nj
    let ok_a = server
        .mock("POST", "/stored_files")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::PartialJson(json!({ "content": "YWFh", "ownerId": 7 })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 11, "ownerId": 7}"#)
        .create_async()
        .await;
    let failed_b = server
        .mock("POST", "/stored_files")
        .match_body(Matcher::PartialJson(json!({ "content": "YmJi" })))
        .with_status(500)
        .with_body(r#"{"message": "Storage full"}"#)
        .create_async()
        .await;
    let ok_c = server
        .mock("POST", "/stored_files")
        .match_body(Matcher::PartialJson(json!({ "content": "Y2Nj", "formatId": 2 })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 13, "ownerId": 7}"#)
        .create_async()
        .await;

    let orchestrator = UploadOrchestrator::new(client_for(&server.url()));
    let files = vec![pdf("a.pdf", b"aaa"), pdf("b.pdf", b"bbb"), pdf("c.pdf", b"ccc")];
    let batch = orchestrator
        .submit(&files, Some("tok"), 7, &metadata())
        .await;

    assert_eq!(batch.state, BatchState::SomeFailed);
    assert_eq!(batch.results.len(), 3);
    assert_eq!(batch.succeeded(), 2);

    assert_eq!(batch.results[0].file_name, "a.pdf");
    assert!(matches!(&batch.results[0].outcome, UploadOutcome::SubmittedOk(f) if f.id == 11));
    assert_eq!(batch.results[1].file_name, "b.pdf");
    assert!(matches!(
        &batch.results[1].outcome,
        UploadOutcome::SubmittedFailed(e) if e.to_string() == "Storage full"
    ));
    assert!(matches!(&batch.results[2].outcome, UploadOutcome::SubmittedOk(f) if f.id == 13));

    ok_a.assert_async().await;
    failed_b.assert_async().await;
    ok_c.assert_async().await;
}

#[tokio::test]
async fn test_pending_uploads_kept_on_partial_failure() {
    let mut server = Server::new_async().await;
    let _ok = server
        .mock("POST", "/stored_files")
        .match_body(Matcher::PartialJson(json!({ "content": "YWFh" })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 1}"#)
        .create_async()
        .await;
    let _fail = server
        .mock("POST", "/stored_files")
        .match_body(Matcher::PartialJson(json!({ "content": "YmJi" })))
        .with_status(400)
        .with_body(r#"{"error": "Unknown format"}"#)
        .create_async()
        .await;

    let orchestrator = UploadOrchestrator::new(client_for(&server.url()));
    let mut pending = pending_queue();
    pending.add_all([pdf("a.pdf", b"aaa"), pdf("b.pdf", b"bbb")]);

    let batch = pending
        .submit(&orchestrator, Some("tok"), 1, &metadata())
        .await
        .unwrap();
    assert_eq!(batch.state, BatchState::SomeFailed);
    assert_eq!(pending.state(), BatchState::SomeFailed);
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn test_pending_uploads_cleared_on_full_success() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/stored_files")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 5}"#)
        .expect(2)
        .create_async()
        .await;

    let orchestrator = UploadOrchestrator::new(client_for(&server.url()));
    let mut pending = pending_queue();
    let added = pending.add_all([
        pdf("a.pdf", b"aaa"),
        UploadCandidate::from_bytes("notes.txt", Some("text/plain".to_string()), b"x".to_vec()),
        pdf("b.pdf", b"bbb"),
    ]);
    assert!(added[1].is_rejected());
    assert_eq!(pending.len(), 2);

    let batch = pending
        .submit(&orchestrator, Some("tok"), 1, &metadata())
        .await
        .unwrap();
    assert_eq!(batch.state, BatchState::AllSucceeded);
    assert!(pending.is_empty());
    create.assert_async().await;
}

#[tokio::test]
async fn test_empty_submit_sends_nothing() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/stored_files")
        .expect(0)
        .create_async()
        .await;

    let orchestrator = UploadOrchestrator::new(client_for(&server.url()));
    let mut pending = pending_queue();
    let err = pending
        .submit(&orchestrator, Some("tok"), 1, &metadata())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No files selected");
    create.assert_async().await;
}

#[tokio::test]
async fn test_request_timeout() {
    let (_listener, url) = silent_server().await;
    let client = ApiClient::new(&url, &url, Duration::from_millis(100)).unwrap();

    let err = client.list_formats().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Request timed out after 100 ms");
}

#[tokio::test]
async fn test_cancelled_upload_reports_per_file() {
    let (_listener, url) = silent_server().await;
    let client = ApiClient::new(&url, &url, Duration::from_secs(30)).unwrap();
    let orchestrator = UploadOrchestrator::new(client);
    let token = orchestrator.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let files = vec![pdf("a.pdf", b"aaa"), pdf("b.pdf", b"bbb")];
    let batch = orchestrator.submit(&files, None, 1, &metadata()).await;
    assert_eq!(batch.state, BatchState::SomeFailed);
    for result in &batch.results {
        assert!(matches!(
            result.outcome,
            UploadOutcome::SubmittedFailed(ApiError::Cancelled)
        ));
    }
}

#[tokio::test]
async fn test_submit_after_cancel_starts_fresh() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/stored_files")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 21}"#)
        .create_async()
        .await;

    let orchestrator = UploadOrchestrator::new(client_for(&server.url()));
    orchestrator.cancel();

    let batch = orchestrator
        .submit(&[pdf("a.pdf", b"aaa")], Some("tok"), 1, &metadata())
        .await;
    assert_eq!(batch.state, BatchState::AllSucceeded);
    create.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/stored_files")
        .with_status(401)
        .with_body(r#"{"detail": "Token expired"}"#)
        .create_async()
        .await;

    let err = client_for(&server.url())
        .list_stored_files()
        .await
        .unwrap_err();
    assert!(err.is_auth_error());
    assert_eq!(err.to_string(), "Token expired");
}

#[tokio::test]
async fn test_login_stores_session_and_authorizes_requests() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/users/login")
        .match_body(Matcher::Json(json!({ "email": "ada@example.com", "password": "secret1" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "token": "jwt-1",
                "user": { "id": 42, "email": "ada@example.com", "isAdmin": true }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let profile = server
        .mock("GET", "/users/42")
        .match_header("authorization", "Bearer jwt-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 42, "mail": "ada@example.com", "firstName": "Ada"}"#)
        .create_async()
        .await;

    let session = Arc::new(SessionStore::in_memory());
    let auth = AuthService::new(
        client_for(&server.url()),
        session.clone(),
        AuthErrorPolicy::Keep,
    );

    auth.login(" ada@example.com ", "secret1").await.unwrap();
    let current = session.current_session();
    assert_eq!(current.token.as_deref(), Some("jwt-1"));
    assert_eq!(current.user_id, Some(42));
    assert!(current.is_admin());

    let user_id = auth.require_user_id().unwrap();
    let user = auth
        .authorized_client()
        .unwrap()
        .get_user(user_id)
        .await
        .unwrap();
    assert_eq!(user.first_name.as_deref(), Some("Ada"));

    login.assert_async().await;
    profile.assert_async().await;
}

#[tokio::test]
async fn test_failed_login_leaves_session_empty() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("POST", "/users/login")
        .with_status(400)
        .with_body(r#"{"message": "Invalid email or password"}"#)
        .create_async()
        .await;

    let auth = AuthService::new(
        client_for(&server.url()),
        Arc::new(SessionStore::in_memory()),
        AuthErrorPolicy::Keep,
    );
    let err = auth.login("ada@example.com", "wrong-pass").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");
    assert!(!auth.session().is_logged_in());
}

#[tokio::test]
async fn test_logout_policy_on_expired_token() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("PUT", "/users/update_password")
        .with_status(401)
        .with_body(r#"{"error": "Token expired"}"#)
        .create_async()
        .await;

    let session = Arc::new(SessionStore::in_memory());
    session.login("old", 3, "x@y.io", None).unwrap();
    let auth = AuthService::new(
        client_for(&server.url()),
        session.clone(),
        AuthErrorPolicy::Logout,
    );

    let err = auth.change_password("secret1", "secret2").await.unwrap_err();
    assert!(err.is_auth_error());
    assert!(!session.is_logged_in());
}

#[tokio::test]
async fn test_forbidden_keeps_session_under_logout_policy() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/admins")
        .match_header("authorization", "Bearer tok")
        .with_status(403)
        .with_body(r#"{"message": "Admin only"}"#)
        .create_async()
        .await;

    let session = Arc::new(SessionStore::in_memory());
    session.login("tok", 3, "x@y.io", Some(false)).unwrap();
    let auth = AuthService::new(
        client_for(&server.url()),
        session.clone(),
        AuthErrorPolicy::Logout,
    );

    let client = auth.authorized_client().unwrap();
    let err = auth.check(client.list_admins().await).unwrap_err();
    assert!(!err.is_auth_error());
    assert_eq!(err.to_string(), "Admin only");
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn test_delete_account_logs_out() {
    let mut server = Server::new_async().await;
    let delete = server
        .mock("DELETE", "/users/delete_account")
        .match_header("authorization", "Bearer tok")
        .with_status(204)
        .create_async()
        .await;

    let session = Arc::new(SessionStore::in_memory());
    session.login("tok", 3, "x@y.io", None).unwrap();
    let auth = AuthService::new(
        client_for(&server.url()),
        session.clone(),
        AuthErrorPolicy::Keep,
    );

    auth.delete_account().await.unwrap();
    assert!(!session.is_logged_in());
    delete.assert_async().await;
}

#[tokio::test]
async fn test_sfdt_roundtrip_sends_raw_text() {
    let mut server = Server::new_async().await;
    let get = server
        .mock("GET", "/stored_files/9/convert/docx_to_sfdt")
        .with_status(200)
        .with_body(r#"{"sections":[]}"#)
        .create_async()
        .await;
    let put = server
        .mock("PUT", "/stored_files/9/update/sfdt")
        .match_body(r#"{"sections":[1]}"#)
        .with_status(200)
        .create_async()
        .await;

    let client = client_for(&server.url());
    assert_eq!(client.docx_to_sfdt(9).await.unwrap(), r#"{"sections":[]}"#);
    client
        .update_sfdt(9, r#"{"sections":[1]}"#.to_string())
        .await
        .unwrap();

    get.assert_async().await;
    put.assert_async().await;
}
