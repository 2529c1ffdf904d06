use thiserror::Error;

use placement_core::{FieldErrors, ServiceError};
use placement_sql::SQLError;

/// Ledger error type.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation: {0}")]
    Validation(FieldErrors),

    /// The allocation has no available accounts left.
    #[error("no available accounts in allocation {0}")]
    CapacityExhausted(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage was busy past its timeout; the call may be retried.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Single-field validation failure.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errs = FieldErrors::new();
        errs.push(field, message);
        LedgerError::Validation(errs)
    }
}

impl From<FieldErrors> for LedgerError {
    fn from(errs: FieldErrors) -> Self {
        LedgerError::Validation(errs)
    }
}

impl From<SQLError> for LedgerError {
    fn from(e: SQLError) -> Self {
        match e {
            SQLError::Busy(m) => LedgerError::Unavailable(m),
            SQLError::Constraint(m) => LedgerError::Conflict(m),
            SQLError::Aborted => LedgerError::Internal("transaction aborted".into()),
            other => LedgerError::Storage(other.to_string()),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Validation(f) => ServiceError::InvalidFields(f),
            LedgerError::CapacityExhausted(id) => ServiceError::CapacityExhausted(format!(
                "no available accounts in allocation {id}"
            )),
            LedgerError::NotFound(m) => ServiceError::NotFound(m),
            LedgerError::Conflict(m) => ServiceError::Conflict(m),
            LedgerError::Unavailable(m) => ServiceError::Unavailable(m),
            LedgerError::Storage(m) => ServiceError::Storage(m),
            LedgerError::Internal(m) => ServiceError::Internal(m),
        }
    }
}
