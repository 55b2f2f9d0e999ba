//! docscan core library
//!
//! Domain models, error types, configuration and the client-side state
//! stores (session, flash notices) shared by the API client and the CLI.
//! Also home to the file validator that gates uploads before any request is
//! made.

pub mod config;
pub mod error;
pub mod flash;
pub mod models;
pub mod session;
pub mod validation;

// Re-export commonly used types
pub use config::{AuthErrorPolicy, ClientConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use flash::FlashStore;
pub use session::{FileSessionStorage, MemorySessionStorage, SessionStorage, SessionStore};
pub use validation::{AcceptRules, FileValidator, RejectReason};
