use crate::models::Period;

/// User-facing failure taxonomy for the submission and query paths.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("already logged {} for this day", .period.label())]
    DuplicateSubmission { period: Period },

    #[error("validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Duplicate-key race at the storage boundary. The write path treats
    /// this as a duplicate submission; the read path logs and tolerates it.
    #[error("storage conflict: {0}")]
    Conflict(String),
}

impl TrackerError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        TrackerError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
