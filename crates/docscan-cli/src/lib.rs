use std::path::PathBuf;

use docscan_api_client::PendingUploads;
use docscan_core::models::{FlashKind, FlashMessage, UploadCandidate, UploadOutcome, UploadResult};

/// Result of offering local files to the upload queue.
#[derive(Debug, Default)]
pub struct Selection {
    /// One line per file that was not queued: validator rejections and
    /// files that could not be read.
    pub rejected: Vec<String>,
    pub queued: usize,
}

impl Selection {
    /// Fails when nothing made it into the queue, unless only validating.
    pub fn ensure_queued(&self, dry_run: bool) -> anyhow::Result<()> {
        if self.queued == 0 && !dry_run {
            anyhow::bail!(
                "No file passed validation ({} rejected)",
                self.rejected.len()
            );
        }
        Ok(())
    }
}

/// Read metadata for each path and offer it to `pending`.
pub async fn select_files(pending: &mut PendingUploads, paths: &[PathBuf]) -> Selection {
    let mut selection = Selection::default();
    for path in paths {
        match UploadCandidate::from_path(path).await {
            Ok(candidate) => {
                let result = pending.add(candidate);
                if matches!(result.outcome, UploadOutcome::AcceptedAndQueued) {
                    selection.queued += 1;
                } else {
                    selection.rejected.push(result.describe());
                }
            }
            Err(e) => selection.rejected.push(e.to_string()),
        }
    }
    selection
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// One terminal line for a flash notice.
pub fn render_flash(message: &FlashMessage) -> String {
    let tag = match message.kind {
        FlashKind::Success => "ok",
        FlashKind::Error => "error",
        FlashKind::Info => "info",
        FlashKind::Warning => "warn",
    };
    format!("[{}] {}", tag, message.text)
}

/// Table row for one upload outcome; long file names are shortened.
pub fn render_upload_row(result: &UploadResult) -> String {
    let status = if result.is_success() {
        "uploaded"
    } else if result.is_rejected() {
        "rejected"
    } else {
        "failed"
    };
    format!(
        "{:>3}  {:<32}  {:<8}  {}",
        result.index,
        truncate_string(&result.file_name, 32),
        status,
        result.describe()
    )
}

/// Initialize tracing for the CLI. Logs go to stderr so JSON output stays clean.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
