use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Gift content could not be encoded or decoded.
    #[error("Gift content error: {0}")]
    Json(#[from] serde_json::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// The acting user does not participate in the requested event.
    #[error("Event not found")]
    NoAccess,

    /// Signup with an email that already belongs to an account.
    #[error("Email already used")]
    EmailAlreadyUsed,

    /// Invitation of an email unknown to the user directory.
    #[error("No user with email {0}")]
    UnknownParticipant(String),

    /// The invited user already participates in the event.
    #[error("User is already a participant")]
    AlreadyParticipant,

    /// Someone other than the recorded buyer tried to change a claimed gift.
    #[error("Gift already has a buyer")]
    BuyerConflict,

    /// Rejected input (empty name, empty message, ...).
    #[error("{0}")]
    Validation(String),

    /// Password hashing failure.
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Coarse classification of a [`StoreError`], used by the HTTP boundary to
/// choose a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccessDenied,
    Conflict,
    NotFound,
    Validation,
    Internal,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NoAccess => ErrorKind::AccessDenied,
            StoreError::BuyerConflict | StoreError::EmailAlreadyUsed => ErrorKind::Conflict,
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::UnknownParticipant(_)
            | StoreError::AlreadyParticipant
            | StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Sqlite(_)
            | StoreError::Io(_)
            | StoreError::Json(_)
            | StoreError::PasswordHash(_)
            | StoreError::Migration(_)
            | StoreError::Uuid(_)
            | StoreError::ChronoParse(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map `QueryReturnedNoRows` to [`StoreError::NotFound`].
pub(crate) fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Whether `e` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
