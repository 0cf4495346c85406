use crate::records::StatusLookupError;

/// A single failed field rule reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Raised by a validator before any write is attempted.
///
/// Carries every failed rule, not just the first one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} field(s) rejected: {}", .errors.len(), join_field_errors(.errors))]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if any failed rule concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

/// Accumulates field failures while a validator walks a record.
#[derive(Debug, Default)]
pub(crate) struct ErrorList {
    errors: Vec<FieldError>,
}

impl ErrorList {
    pub(crate) fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub(crate) fn into_result(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}

/// Failure reported by the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to acquire database connection: {0}")]
    Connection(#[from] r2d2::Error),
    #[error("database statement failed: {0}")]
    Statement(#[from] rusqlite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("stored record is inconsistent: {0}")]
    Status(#[from] StatusLookupError),
    #[error("failed to open database pool at {}: {source}", .path.display())]
    PoolSetup {
        path: std::path::PathBuf,
        #[source]
        source: r2d2::Error,
    },
}

impl From<rusqlite::Error> for RecordError {
    fn from(e: rusqlite::Error) -> Self {
        RecordError::Storage(StorageError::Statement(e))
    }
}

impl From<r2d2::Error> for RecordError {
    fn from(e: r2d2::Error) -> Self {
        RecordError::Storage(StorageError::Connection(e))
    }
}

impl RecordError {
    pub fn is_validation(&self) -> bool {
        matches!(self, RecordError::Validation(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, RecordError::Storage(_))
    }
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;
