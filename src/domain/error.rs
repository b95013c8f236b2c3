//! Domain Error Types
//!
//! Request-level rule violations, checked before a transfer reaches the
//! engine. They do not depend on the storage backend.

use thiserror::Error;

/// Business rule violations detected by the caller of the transfer engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Amount must be strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Currency code is not one of the supported codes
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Account currency differs from the requested currency
    #[error("Account [{account_id}] currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        actual: String,
        expected: String,
    },

    /// Account does not belong to the requesting user
    #[error("Account [{0}] doesn't belong to the authenticated user")]
    NotAccountOwner(i64),

    /// Account id must be a positive integer
    #[error("Invalid account id: {0}")]
    InvalidAccountId(i64),

    /// Paging parameters out of range
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}

impl DomainError {
    pub fn currency_mismatch(
        account_id: i64,
        actual: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::CurrencyMismatch {
            account_id,
            actual: actual.into(),
            expected: expected.into(),
        }
    }
}
