//! Record Store module
//!
//! Durable keyed storage for accounts, entries, transfers and users.
//! The store exposes point operations and an atomic balance delta; it never
//! sequences multi-step work itself. Multi-step work goes through a
//! [`UnitOfWork`] obtained from [`RecordStore::begin`].

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;

use crate::domain::models::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    CreateUserParams, ListAccountsParams, ListEntriesParams, ListTransfersParams,
};
use crate::domain::{Account, Entry, Transfer, User};

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, StoreOp};
pub use postgres::PgStore;

/// Point CRUD over the ledger tables
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create an account with a zero balance
    async fn create_account(&self, params: CreateAccountParams) -> StoreResult<Account>;

    async fn get_account(&self, id: i64) -> StoreResult<Account>;

    /// Accounts of one owner in creation order
    async fn list_accounts(&self, params: ListAccountsParams) -> StoreResult<Vec<Account>>;

    /// Deleting a missing account is not an error
    async fn delete_account(&self, id: i64) -> StoreResult<()>;

    async fn create_entry(&self, params: CreateEntryParams) -> StoreResult<Entry>;

    async fn get_entry(&self, id: i64) -> StoreResult<Entry>;

    async fn list_entries(&self, params: ListEntriesParams) -> StoreResult<Vec<Entry>>;

    async fn create_transfer(&self, params: CreateTransferParams) -> StoreResult<Transfer>;

    async fn get_transfer(&self, id: i64) -> StoreResult<Transfer>;

    /// Transfers leaving `from_account_id` or entering `to_account_id`
    async fn list_transfers(&self, params: ListTransfersParams) -> StoreResult<Vec<Transfer>>;

    /// Add `delta` to the balance in one atomic statement and return the
    /// updated row
    async fn add_account_balance(&self, params: AddAccountBalanceParams) -> StoreResult<Account>;

    async fn create_user(&self, params: CreateUserParams) -> StoreResult<User>;

    async fn get_user(&self, username: &str) -> StoreResult<User>;

    /// Start an atomic unit of work
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// Writes that commit or abort together.
///
/// Nothing written through a unit of work is visible to other observers
/// before `commit`. Dropping it without committing discards every write.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn get_account(&mut self, id: i64) -> StoreResult<Account>;

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StoreResult<Transfer>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> StoreResult<Entry>;

    /// Atomic balance delta. Takes the account's row lock and holds it
    /// until the unit of work ends.
    async fn add_account_balance(&mut self, params: AddAccountBalanceParams)
        -> StoreResult<Account>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
