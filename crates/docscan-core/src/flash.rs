//! Flash notification store
//!
//! Transient user notices that remove themselves after a timeout. Each post
//! schedules its own timer task; dismissing a message aborts that timer, and
//! dropping the store aborts every timer still pending.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;

use crate::models::{FlashKind, FlashMessage};

/// Used when no timeout is configured.
pub const DEFAULT_FLASH_TIMEOUT: Duration = Duration::from_millis(3000);

struct Entry {
    message: FlashMessage,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl Inner {
    fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|e| e.message.id == id) {
            Some(pos) => {
                let entry = entries.remove(pos);
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }
}

/// Ordered queue of active flash messages.
pub struct FlashStore {
    inner: Arc<Inner>,
    default_timeout: Duration,
}

impl Default for FlashStore {
    fn default() -> Self {
        Self::new(DEFAULT_FLASH_TIMEOUT)
    }
}

impl FlashStore {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Post a message that expires after `timeout`. A zero timeout keeps the
    /// message until it is dismissed.
    ///
    /// Outside a tokio runtime no timer can be scheduled; the message then
    /// also stays until dismissed.
    pub fn post(&self, kind: FlashKind, text: impl Into<String>, timeout: Duration) -> String {
        let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("flash-message-{}", n);
        let message = FlashMessage {
            id: id.clone(),
            kind,
            text: text.into(),
            posted_at: Utc::now(),
        };
        tracing::debug!(id = %id, kind = %kind, "Flash posted");

        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry {
                message,
                timer: None,
            });

        if timeout.is_zero() {
            return id;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(id = %id, "No runtime for flash timer; message is sticky");
                return id;
            }
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let expiring = id.clone();
        let task = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.remove(&expiring);
                tracing::trace!(id = %expiring, "Flash expired");
            }
        });

        let mut entries = self
            .inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // The timer may already have fired for very short timeouts.
        if let Some(entry) = entries.iter_mut().find(|e| e.message.id == id) {
            entry.timer = Some(task.abort_handle());
        }
        id
    }

    pub fn post_default(&self, kind: FlashKind, text: impl Into<String>) -> String {
        self.post(kind, text, self.default_timeout)
    }

    pub fn success(&self, text: impl Into<String>) -> String {
        self.post_default(FlashKind::Success, text)
    }

    pub fn error(&self, text: impl Into<String>) -> String {
        self.post_default(FlashKind::Error, text)
    }

    pub fn info(&self, text: impl Into<String>) -> String {
        self.post_default(FlashKind::Info, text)
    }

    pub fn warning(&self, text: impl Into<String>) -> String {
        self.post_default(FlashKind::Warning, text)
    }

    /// Remove a message and cancel its timer. Unknown ids are ignored.
    pub fn dismiss(&self, id: &str) {
        if self.inner.remove(id) {
            tracing::debug!(id = %id, "Flash dismissed");
        }
    }

    /// Active messages, oldest first.
    pub fn active(&self) -> Vec<FlashMessage> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Drop every message and cancel every pending timer.
    pub fn clear(&self) {
        let drained: Vec<Entry> = self
            .inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for entry in drained {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }
}

impl Drop for FlashStore {
    fn drop(&mut self) {
        self.clear();
    }
}
