//! Upload orchestrator
//!
//! Turns validated candidates into `POST /stored_files` requests. All files
//! of a batch are read, encoded and sent concurrently; every file reports its
//! own outcome, and one failure never cancels the others.

use std::sync::{Mutex, PoisonError};

use base64::Engine;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::{ApiClient, ApiError};
use docscan_core::models::{
    NewStoredFile, StoredFile, UploadCandidate, UploadMetadata, UploadOutcome, UploadResult,
};
use docscan_core::validation::{FileValidator, RejectReason};

/// Lifecycle of one submission batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Sending,
    AllSucceeded,
    SomeFailed,
}

/// Results of one batch, in the order the files were given.
#[derive(Debug)]
pub struct UploadBatch {
    pub state: BatchState,
    pub results: Vec<UploadResult>,
}

impl UploadBatch {
    fn from_results(results: Vec<UploadResult>) -> Self {
        let state = if results.iter().all(UploadResult::is_success) {
            BatchState::AllSucceeded
        } else {
            BatchState::SomeFailed
        };
        Self { state, results }
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

pub struct UploadOrchestrator {
    client: ApiClient,
    cancel: Mutex<CancellationToken>,
}

impl UploadOrchestrator {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Token that aborts every batch currently in flight. Once cancelled it
    /// is replaced, so the next `submit` starts with a live token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cancel(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Per-batch child of the orchestrator token.
    fn batch_token(&self) -> CancellationToken {
        let mut parent = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if parent.is_cancelled() {
            *parent = CancellationToken::new();
        }
        parent.child_token()
    }

    /// Submit every candidate concurrently. Requests are issued in slice order;
    /// results are matched to their file by index, whatever order responses
    /// arrive in.
    #[tracing::instrument(skip_all, fields(files = files.len(), owner_id = owner_id))]
    pub async fn submit(
        &self,
        files: &[UploadCandidate],
        token: Option<&str>,
        owner_id: i64,
        metadata: &UploadMetadata,
    ) -> UploadBatch {
        let client = self
            .client
            .with_bearer(token.map(str::to_string))
            .with_cancellation(self.batch_token());

        let requests = files
            .iter()
            .enumerate()
            .map(|(index, file)| submit_one(&client, index, file, owner_id, metadata));
        let results = join_all(requests).await;

        let batch = UploadBatch::from_results(results);
        tracing::info!(
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            "Upload batch finished"
        );
        batch
    }
}

async fn submit_one(
    client: &ApiClient,
    index: usize,
    file: &UploadCandidate,
    owner_id: i64,
    metadata: &UploadMetadata,
) -> UploadResult {
    let outcome = match send_file(client, file, owner_id, metadata).await {
        Ok(stored) => UploadOutcome::SubmittedOk(stored),
        Err(e) => {
            tracing::warn!(index, file = %file.name, error = %e, "Upload failed");
            UploadOutcome::SubmittedFailed(e)
        }
    };
    UploadResult {
        index,
        file_name: file.name.clone(),
        outcome,
    }
}

async fn send_file(
    client: &ApiClient,
    file: &UploadCandidate,
    owner_id: i64,
    metadata: &UploadMetadata,
) -> Result<StoredFile, ApiError> {
    let data = file.read().await?;
    // Encoding is CPU-bound; keep it off the async workers.
    let content = tokio::task::spawn_blocking(move || {
        base64::engine::general_purpose::STANDARD.encode(&data)
    })
    .await
    .map_err(|e| ApiError::Validation(format!("Failed to encode {}: {}", file.name, e)))?;

    let body = NewStoredFile {
        owner_id,
        format_id: metadata.format_id,
        processing_model_id: metadata.processing_model_id,
        generation: metadata.generation,
        primary_file_id: metadata.primary_file_id,
        content,
    };
    client.create_stored_file(&body).await
}

/// Candidate list between selection and submission.
///
/// Files pass the validator on the way in. After a batch the list is cleared
/// only when every file succeeded; otherwise it is kept so the user can retry.
///
/// `add` results are indexed by offer position: every file handed to `add`
/// since the list was last cleared counts, accepted or not.
pub struct PendingUploads {
    validator: FileValidator,
    candidates: Vec<UploadCandidate>,
    offered: usize,
    state: BatchState,
}

impl PendingUploads {
    pub fn new(validator: FileValidator) -> Self {
        Self {
            validator,
            candidates: Vec::new(),
            offered: 0,
            state: BatchState::Idle,
        }
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    /// Validate and queue one file. Rejected files are reported, not queued.
    pub fn add(&mut self, candidate: UploadCandidate) -> UploadResult {
        let index = self.offered;
        self.offered += 1;
        let file_name = candidate.name.clone();
        let outcome = match self.validator.validate(&candidate) {
            Ok(()) => {
                self.candidates.push(candidate);
                UploadOutcome::AcceptedAndQueued
            }
            Err(reason @ RejectReason::TooLarge { .. }) => {
                UploadOutcome::RejectedTooLarge(reason.to_string())
            }
            Err(reason @ RejectReason::WrongType { .. }) => {
                UploadOutcome::RejectedWrongType(reason.to_string())
            }
        };
        UploadResult {
            index,
            file_name,
            outcome,
        }
    }

    pub fn add_all(
        &mut self,
        candidates: impl IntoIterator<Item = UploadCandidate>,
    ) -> Vec<UploadResult> {
        candidates.into_iter().map(|c| self.add(c)).collect()
    }

    pub fn remove(&mut self, index: usize) -> Option<UploadCandidate> {
        (index < self.candidates.len()).then(|| self.candidates.remove(index))
    }

    pub fn candidates(&self) -> &[UploadCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Submit the queued files as one batch.
    pub async fn submit(
        &mut self,
        orchestrator: &UploadOrchestrator,
        token: Option<&str>,
        owner_id: i64,
        metadata: &UploadMetadata,
    ) -> Result<UploadBatch, ApiError> {
        if self.candidates.is_empty() {
            return Err(ApiError::Validation("No files selected".to_string()));
        }
        self.state = BatchState::Sending;
        let batch = orchestrator
            .submit(&self.candidates, token, owner_id, metadata)
            .await;
        self.state = batch.state;
        if batch.state == BatchState::AllSucceeded {
            self.candidates.clear();
            self.offered = 0;
        }
        Ok(batch)
    }
}
