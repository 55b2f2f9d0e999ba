//! Session store
//!
//! Holds the bearer token and user identity for the lifetime of a client
//! "tab". The store is rehydrated explicitly at start-up from a
//! [`SessionStorage`] backend, and every mutation writes through to it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::AppError;
use crate::models::{AuthResponse, Session};

/// Persistence backend for the session.
pub trait SessionStorage: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Session>, AppError>;
    fn save(&self, session: &Session) -> Result<(), AppError>;
    fn clear(&self) -> Result<(), AppError>;
}

/// Process-scoped storage; gone when the process exits.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<Session>, AppError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &Session) -> Result<(), AppError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file storage, used by the CLI so a session survives between invocations.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<Session>, AppError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_str(&raw)?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Write then rename so a reader never sees a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Owned session state with write-through persistence.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: RwLock<Session>,
}

impl SessionStore {
    /// Load the persisted session. Unreadable or corrupt storage yields a
    /// logged-out session instead of an error.
    pub fn rehydrate(storage: Arc<dyn SessionStorage>) -> Self {
        let session = match storage.load() {
            Ok(Some(session)) => {
                tracing::debug!(user_id = ?session.user_id, "Rehydrated session");
                session
            }
            Ok(None) => Session::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable session storage");
                Session::default()
            }
        };
        Self {
            storage,
            state: RwLock::new(session),
        }
    }

    /// Empty store over process-scoped storage.
    pub fn in_memory() -> Self {
        Self::rehydrate(Arc::new(MemorySessionStorage::new()))
    }

    /// Persist and publish a new session. The in-memory state is replaced in a
    /// single write, after storage succeeded.
    pub fn login(
        &self,
        token: impl Into<String>,
        user_id: i64,
        user_email: impl Into<String>,
        is_admin: Option<bool>,
    ) -> Result<(), AppError> {
        let session = Session::new(token.into(), user_id, user_email.into(), is_admin);
        self.storage.save(&session)?;
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = session;
        tracing::info!(user_id, "Logged in");
        Ok(())
    }

    pub fn login_with(&self, auth: &AuthResponse) -> Result<(), AppError> {
        self.login(
            auth.token.clone(),
            auth.user.id,
            auth.user.email.clone(),
            auth.user.is_admin,
        )
    }

    /// Clear memory and storage. Memory is cleared even if storage fails.
    pub fn logout(&self) -> Result<(), AppError> {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Session::default();
        tracing::info!("Logged out");
        self.storage.clear()
    }

    pub fn current_session(&self) -> Session {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_logged_in()
    }

    pub fn bearer(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user_id
    }
}
