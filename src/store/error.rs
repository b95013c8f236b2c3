//! Record Store Errors
//!
//! Backend-neutral error taxonomy. PostgreSQL errors are classified by
//! SQLSTATE so callers never match on driver types.

/// SQLSTATE codes that indicate a contended or interrupted transaction
const TRANSIENT_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
    "57014", // query_canceled (statement/lock timeout)
    "57P01", // admin_shutdown
];

/// Errors that can occur in a record store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Referenced row does not exist
    #[error("Record not found")]
    NotFound,

    /// Row references a missing parent (or is still referenced)
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Row duplicates a unique key
    #[error("Unique violation: {0}")]
    UniqueViolation(String),

    /// Connection loss, lock-wait timeout, deadlock victim
    #[error("Transient store error: {0}")]
    Transient(String),

    #[error("Store error: {0}")]
    Unknown(String),
}

impl StoreError {
    /// Check if re-running the whole unit of work may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.is_foreign_key_violation() {
                    return StoreError::ForeignKeyViolation(db_err.message().to_string());
                }
                if db_err.is_unique_violation() {
                    return StoreError::UniqueViolation(db_err.message().to_string());
                }
                match db_err.code() {
                    Some(code) if TRANSIENT_SQLSTATES.iter().any(|c| *c == code) => {
                        StoreError::Transient(db_err.message().to_string())
                    }
                    _ => StoreError::Unknown(err.to_string()),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Transient(err.to_string()),
            _ => StoreError::Unknown(err.to_string()),
        }
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
