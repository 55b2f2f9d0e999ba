use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::StoredFile;
use crate::error::AppError;
use crate::validation::guess_content_type;

/// Where a candidate's bytes live until submission.
#[derive(Debug, Clone)]
pub enum CandidateSource {
    Bytes(Bytes),
    /// Read lazily when the batch is submitted.
    Path(PathBuf),
}

/// File selected for upload. Held only between selection and submission.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub name: String,
    pub size: u64,
    pub declared_type: Option<String>,
    pub source: CandidateSource,
}

impl UploadCandidate {
    pub fn from_bytes(
        name: impl Into<String>,
        declared_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            declared_type,
            source: CandidateSource::Bytes(data),
        }
    }

    /// Build a candidate from a local file. Only metadata is read here; the
    /// declared type is guessed from the extension, as a browser would.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot read {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(AppError::Validation(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let declared_type = guess_content_type(&name).map(str::to_string);
        Ok(Self {
            name,
            size: metadata.len(),
            declared_type,
            source: CandidateSource::Path(path.to_path_buf()),
        })
    }

    /// Declared MIME type, lower-cased; empty when unknown.
    pub fn mime(&self) -> String {
        self.declared_type
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase()
    }

    /// Read the file contents without blocking the runtime.
    pub async fn read(&self) -> Result<Bytes, AppError> {
        match &self.source {
            CandidateSource::Bytes(b) => Ok(b.clone()),
            CandidateSource::Path(p) => {
                let data = tokio::fs::read(p).await.map_err(|e| {
                    AppError::Validation(format!("Failed to read {}: {}", self.name, e))
                })?;
                Ok(Bytes::from(data))
            }
        }
    }
}

/// Versioning and routing fields sent with each file of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMetadata {
    pub format_id: Option<i64>,
    pub processing_model_id: Option<i64>,
    pub generation: i32,
    pub primary_file_id: Option<i64>,
}

#[derive(Debug)]
pub enum UploadOutcome {
    AcceptedAndQueued,
    RejectedTooLarge(String),
    RejectedWrongType(String),
    SubmittedOk(StoredFile),
    SubmittedFailed(AppError),
}

/// Per-file outcome, attributed to its source file by position and name.
#[derive(Debug)]
pub struct UploadResult {
    pub index: usize,
    pub file_name: String,
    pub outcome: UploadOutcome,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, UploadOutcome::SubmittedOk(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(
            self.outcome,
            UploadOutcome::RejectedTooLarge(_) | UploadOutcome::RejectedWrongType(_)
        )
    }

    /// One-line, user-facing summary.
    pub fn describe(&self) -> String {
        match &self.outcome {
            UploadOutcome::AcceptedAndQueued => format!("{}: queued", self.file_name),
            UploadOutcome::RejectedTooLarge(msg) | UploadOutcome::RejectedWrongType(msg) => {
                format!("{}: {}", self.file_name, msg)
            }
            UploadOutcome::SubmittedOk(file) => {
                format!("{}: uploaded as #{}", self.file_name, file.id)
            }
            UploadOutcome::SubmittedFailed(err) => format!("{}: {}", self.file_name, err),
        }
    }
}
