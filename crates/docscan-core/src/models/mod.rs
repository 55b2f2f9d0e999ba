//! Data models for the client
//!
//! Wire records mirror the backend DTOs (camelCase JSON); local records
//! (session, flash, upload candidates) never leave the process except the
//! session, which is persisted by [`crate::session`].

mod flash;
mod format;
mod session;
mod stored_file;
mod upload;
mod user;

pub use flash::{FlashKind, FlashMessage};
pub use format::{AvailableModel, Format, NewFormat};
pub use session::Session;
pub use stored_file::{NewStoredFile, StoredFile};
pub use upload::{CandidateSource, UploadCandidate, UploadMetadata, UploadOutcome, UploadResult};
pub use user::{
    AdminEntry, AdminUpdate, AuthResponse, AuthUser, Credentials, PasswordChange, ProfileUpdate,
    RegisterRequest, UserProfile,
};
