//! Transfer Engine module
//!
//! The only component that sequences writes across entities. Everything a
//! transfer touches is created or updated inside one unit of work.

mod commands;
mod error;
mod retry;
mod transfer_engine;

pub use commands::{TransferParams, TransferResult};
pub use error::TransferError;
pub use retry::RetryPolicy;
pub use transfer_engine::{EngineConfig, TransferEngine};
