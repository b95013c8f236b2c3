//! simple_bank Library
//!
//! Ledger core: a record store over accounts, entries, transfers and users,
//! and a transfer engine that moves money between two accounts atomically.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
mod error;
pub mod store;

pub use config::Config;
pub use domain::{Account, Currency, DomainError, Entry, OperationContext, Transfer, User};
pub use engine::{EngineConfig, RetryPolicy, TransferEngine, TransferError, TransferParams, TransferResult};
pub use error::{AppError, AppResult};
pub use store::{MemoryStore, PgStore, RecordStore, StoreError, StoreOp, StoreResult, UnitOfWork};
