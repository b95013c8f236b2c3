//! Domain module
//!
//! Ledger entities and request-level rules.

pub mod context;
pub mod currency;
pub mod error;
pub mod models;

pub use context::OperationContext;
pub use currency::Currency;
pub use error::DomainError;
pub use models::{Account, Entry, Transfer, User};
