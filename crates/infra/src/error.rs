use thiserror::Error;

use garagebook_core::DomainError;

use crate::store::StoreError;

/// Coarse classification of a [`WorkshopError`], used by outer layers to pick a status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Transaction,
}

/// Error returned by every workshop command and query.
///
/// A command that fails with any variant has left storage exactly as it was before the
/// command started.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkshopError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transaction failed: {0}")]
    Transaction(String),
}

pub type WorkshopResult<T> = Result<T, WorkshopError>;

impl WorkshopError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Transaction(_) => ErrorKind::Transaction,
        }
    }

    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::Conflict(msg)
            | Self::NotFound(msg)
            | Self::Transaction(msg) => msg,
        }
    }
}

impl From<DomainError> for WorkshopError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::NotFound(msg) => Self::NotFound(msg),
        }
    }
}

impl From<StoreError> for WorkshopError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_)
            | StoreError::ForeignKeyViolation(_)
            | StoreError::AlreadyBound(_) => Self::Conflict(err.to_string()),
            StoreError::RowNotFound(what) => Self::NotFound(what),
            StoreError::Backend(msg) => Self::Transaction(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garagebook_core::InterventionId;

    #[test]
    fn store_errors_map_onto_workshop_kinds() {
        let cases = [
            (StoreError::UniqueViolation("invoices.number".into()), ErrorKind::Conflict),
            (StoreError::ForeignKeyViolation("owner".into()), ErrorKind::Conflict),
            (StoreError::AlreadyBound(InterventionId::new(3)), ErrorKind::Conflict),
            (StoreError::RowNotFound("vehicle 9".into()), ErrorKind::NotFound),
            (StoreError::Backend("disk full".into()), ErrorKind::Transaction),
        ];
        for (store_err, kind) in cases {
            assert_eq!(WorkshopError::from(store_err).kind(), kind);
        }
    }

    #[test]
    fn invalid_ids_are_validation_errors() {
        let err = WorkshopError::from(DomainError::invalid_id("vehicle_id: must be positive"));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "vehicle_id: must be positive");
    }
}
