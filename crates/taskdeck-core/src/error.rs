use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Which record collection an operation referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Task,
    Category,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Task => f.write_str("task"),
            RecordKind::Category => f.write_str("category"),
        }
    }
}

/// Failures surfaced by a task or category store.
///
/// Every variant is terminal for the call that produced it; callers decide
/// whether to surface, ignore, or re-trigger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The operation referenced an id the store does not hold.
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: Uuid },

    /// A required field was missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transport or backend failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn task_not_found(id: Uuid) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Task,
            id,
        }
    }

    pub fn category_not_found(id: Uuid) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Category,
            id,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unavailable(format!("malformed record: {err}"))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::StoreError;

    #[test]
    fn not_found_names_the_record_kind() {
        let id = Uuid::nil();
        let err = StoreError::task_not_found(id);
        assert_eq!(err.to_string(), format!("task not found: {id}"));

        let err = StoreError::category_not_found(id);
        assert!(err.to_string().starts_with("category not found"));
    }

    #[test]
    fn io_errors_become_unavailable() {
        let io = std::io::Error::other("disk gone");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Unavailable(msg) if msg.contains("disk gone")));
    }
}
