use thiserror::Error;

/// Observer system errors with structured error types
#[derive(Debug, Error, Clone)]
pub enum ObserverError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{field}: {message}")]
    FieldError { field: String, message: String },

    #[error("System error: {0}")]
    SystemError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl ObserverError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ObserverError::FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Observer warnings (non-fatal issues)
#[derive(Debug, Clone)]
pub struct ObserverWarning {
    pub observer: String,
    pub ring: u8,
    pub message: String,
}

impl ObserverWarning {
    pub fn new(observer: &str, ring: u8, message: String) -> Self {
        Self {
            observer: observer.to_string(),
            ring,
            message,
        }
    }
}

/// Convert from database errors
impl From<crate::database::manager::DatabaseError> for ObserverError {
    fn from(error: crate::database::manager::DatabaseError) -> Self {
        ObserverError::DatabaseError(error.to_string())
    }
}

impl From<sqlx::Error> for ObserverError {
    fn from(error: sqlx::Error) -> Self {
        ObserverError::DatabaseError(error.to_string())
    }
}
