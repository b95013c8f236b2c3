//! Transfer Engine Errors

use std::time::Duration;

use crate::store::StoreError;

/// Errors surfaced by [`TransferEngine::execute`](super::TransferEngine::execute)
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// A step or the commit failed; the unit of work was rolled back
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A step failed and the rollback failed too. State must be checked by
    /// an operator.
    #[error("Transfer aborted after '{cause}', and rollback failed: {rollback}")]
    Rollback {
        cause: StoreError,
        rollback: StoreError,
    },

    /// The attempt exceeded its deadline and was abandoned
    #[error("Transfer timed out after {0:?}")]
    Timeout(Duration),
}

impl TransferError {
    /// Check if a fresh attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Store(e) => e.is_retryable(),
            TransferError::Rollback { .. } | TransferError::Timeout(_) => false,
        }
    }
}
