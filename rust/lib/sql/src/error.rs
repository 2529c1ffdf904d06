use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// The database stayed locked past the busy timeout.
    #[error("database busy: {0}")]
    Busy(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A transaction body asked for rollback.
    #[error("transaction aborted")]
    Aborted,
}

impl SQLError {
    /// Whether the same statement may succeed if retried.
    pub fn is_busy(&self) -> bool {
        matches!(self, SQLError::Busy(_))
    }
}
