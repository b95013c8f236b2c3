//! Operation Context
//!
//! Metadata about the current request, carried for ownership checks and
//! log correlation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for an operation, filled in by the HTTP middleware.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationContext {
    /// Username from the X-Request-User header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_user: Option<String>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_user(mut self, username: impl Into<String>) -> Self {
        self.request_user = Some(username.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}
