//! # Errors
//!
//! One error type for every portal operation. The app layer maps each
//! variant onto an HTTP status or a CLI exit code.

use crate::status::{RegistrationStatus, StatusAction};
use thiserror::Error;

/// Result alias used across the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record looked up by id (or key) does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// No registered client holds this mobile number.
    #[error("You are not registered. Please contact your agent.")]
    NotRegistered,

    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// The write conflicts with existing data (duplicates, references).
    #[error("{0}")]
    Conflict(String),

    /// The client does not qualify for the requested category or program.
    #[error("{0}")]
    NotEligible(String),

    /// The client already holds active registrations.
    #[error(
        "You already have {active} active registration(s). You cannot apply for additional \
         programs until your current registration is completed or you request to stop it."
    )]
    DualApplicationBlocked { active: usize },

    /// The requested status change is not allowed from the current status.
    #[error("cannot {action} a registration that is {from}")]
    InvalidTransition {
        from: RegistrationStatus,
        action: StatusAction,
    },

    /// Username/password did not match, or the account is inactive.
    #[error("Invalid username or password")]
    AuthenticationFailed,

    /// Client file could not be parsed.
    #[error(transparent)]
    Upload(#[from] crate::formats::UploadError),

    /// Underlying redb failure.
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    /// Record (de)serialization failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Shorthand for a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a `Conflict` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

// redb splits its errors by phase; they all fold into `redb::Error`.
macro_rules! storage_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CoreError {
                fn from(err: $ty) -> Self {
                    Self::Storage(redb::Error::from(err))
                }
            }
        )*
    };
}

storage_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
