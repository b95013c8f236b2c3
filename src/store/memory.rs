//! In-memory Record Store
//!
//! A process-local backend with the same visible semantics as the
//! PostgreSQL store: foreign keys, unique keys, per-account row locks held
//! for the life of a unit of work, and writes that only become visible on
//! commit. Failures can be injected at any write step.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::models::{
    password_never_changed, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, ListAccountsParams, ListEntriesParams,
    ListTransfersParams,
};
use crate::domain::{Account, Entry, Transfer, User};

use super::{RecordStore, StoreError, StoreResult, UnitOfWork};

/// Operations inside a unit of work where a failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    CreateTransfer,
    CreateEntry,
    AddAccountBalance,
    Commit,
    Rollback,
}

#[derive(Debug)]
struct FailPoint {
    op: StoreOp,
    skip: usize,
    error: StoreError,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<String, User>,
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    account_seq: i64,
    entry_seq: i64,
    transfer_seq: i64,
}

impl Tables {
    fn account(&self, id: i64) -> StoreResult<&Account> {
        self.accounts.get(&id).ok_or(StoreError::NotFound)
    }

    fn require_account(&self, id: i64, constraint: &str) -> StoreResult<()> {
        if self.accounts.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!(
                "insert violates foreign key constraint \"{}\"",
                constraint
            )))
        }
    }

    // Sequences are never rolled back, same as PostgreSQL.
    fn next_entry_id(&mut self) -> i64 {
        self.entry_seq += 1;
        self.entry_seq
    }

    fn next_transfer_id(&mut self) -> i64 {
        self.transfer_seq += 1;
        self.transfer_seq
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<RowLock<()>>>>,
    fail_points: Mutex<Vec<FailPoint>>,
}

impl Inner {
    fn row_lock(&self, account_id: i64) -> Arc<RowLock<()>> {
        self.row_locks
            .lock()
            .entry(account_id)
            .or_insert_with(|| Arc::new(RowLock::new(())))
            .clone()
    }

    /// Trip the first armed fail point for `op`, if its skip count is spent
    fn check(&self, op: StoreOp) -> StoreResult<()> {
        let mut fail_points = self.fail_points.lock();
        let Some(idx) = fail_points.iter().position(|fp| fp.op == op) else {
            return Ok(());
        };
        if fail_points[idx].skip > 0 {
            fail_points[idx].skip -= 1;
            return Ok(());
        }
        Err(fail_points.remove(idx).error)
    }
}

/// Record store held entirely in memory. Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `skip`-th next call (0 = the very next) of `op` inside any
    /// unit of work. One-shot.
    pub fn fail_on(&self, op: StoreOp, skip: usize) {
        self.fail_with(
            op,
            skip,
            StoreError::Unknown(format!("injected failure at {:?}", op)),
        );
    }

    /// Like [`fail_on`](Self::fail_on) with a caller-chosen error
    pub fn fail_with(&self, op: StoreOp, skip: usize, error: StoreError) {
        self.inner
            .fail_points
            .lock()
            .push(FailPoint { op, skip, error });
    }

    /// Number of committed entries, across all accounts
    pub fn entry_count(&self) -> usize {
        self.inner.tables.lock().entries.len()
    }

    /// Number of committed transfers
    pub fn transfer_count(&self) -> usize {
        self.inner.tables.lock().transfers.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_account(&self, params: CreateAccountParams) -> StoreResult<Account> {
        let mut tables = self.inner.tables.lock();

        if !tables.users.contains_key(&params.owner) {
            return Err(StoreError::ForeignKeyViolation(
                "insert violates foreign key constraint \"accounts_owner_fkey\"".to_string(),
            ));
        }
        let duplicate = tables
            .accounts
            .values()
            .any(|a| a.owner == params.owner && a.currency_code == params.currency_code);
        if duplicate {
            return Err(StoreError::UniqueViolation(
                "duplicate key value violates unique constraint \"owner_currency_key\"".to_string(),
            ));
        }

        tables.account_seq += 1;
        let account = Account {
            id: tables.account_seq,
            owner: params.owner,
            currency_code: params.currency_code,
            balance: 0,
            created_at: Utc::now(),
        };
        tables.accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn get_account(&self, id: i64) -> StoreResult<Account> {
        self.inner.tables.lock().account(id).cloned()
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> StoreResult<Vec<Account>> {
        let tables = self.inner.tables.lock();
        Ok(tables
            .accounts
            .values()
            .filter(|a| a.owner == params.owner)
            .skip(page_bound(params.offset))
            .take(page_bound(params.limit))
            .cloned()
            .collect())
    }

    async fn delete_account(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.inner.tables.lock();

        let referenced = tables.entries.values().any(|e| e.account_id == id)
            || tables
                .transfers
                .values()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced {
            return Err(StoreError::ForeignKeyViolation(format!(
                "account {} is still referenced by ledger rows",
                id
            )));
        }

        tables.accounts.remove(&id);
        drop(tables);

        // Ids are never reused, so the lock entry can go with the row.
        self.inner.row_locks.lock().remove(&id);
        Ok(())
    }

    async fn create_entry(&self, params: CreateEntryParams) -> StoreResult<Entry> {
        let mut tables = self.inner.tables.lock();
        let entry = new_entry(&mut tables, params)?;
        tables.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&self, id: i64) -> StoreResult<Entry> {
        let tables = self.inner.tables.lock();
        tables.entries.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_entries(&self, params: ListEntriesParams) -> StoreResult<Vec<Entry>> {
        let tables = self.inner.tables.lock();
        Ok(tables
            .entries
            .values()
            .filter(|e| e.account_id == params.account_id)
            .skip(page_bound(params.offset))
            .take(page_bound(params.limit))
            .cloned()
            .collect())
    }

    async fn create_transfer(&self, params: CreateTransferParams) -> StoreResult<Transfer> {
        let mut tables = self.inner.tables.lock();
        let transfer = new_transfer(&mut tables, params)?;
        tables.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&self, id: i64) -> StoreResult<Transfer> {
        let tables = self.inner.tables.lock();
        tables.transfers.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_transfers(&self, params: ListTransfersParams) -> StoreResult<Vec<Transfer>> {
        let tables = self.inner.tables.lock();
        Ok(tables
            .transfers
            .values()
            .filter(|t| {
                t.from_account_id == params.from_account_id
                    || t.to_account_id == params.to_account_id
            })
            .skip(page_bound(params.offset))
            .take(page_bound(params.limit))
            .cloned()
            .collect())
    }

    async fn add_account_balance(&self, params: AddAccountBalanceParams) -> StoreResult<Account> {
        // Autocommit statement: wait out any unit of work holding the row.
        let _row = self.inner.row_lock(params.id).lock_owned().await;

        let mut tables = self.inner.tables.lock();
        let account = tables
            .accounts
            .get_mut(&params.id)
            .ok_or(StoreError::NotFound)?;
        account.balance = checked_balance(account.balance, params.delta)?;
        Ok(account.clone())
    }

    async fn create_user(&self, params: CreateUserParams) -> StoreResult<User> {
        let mut tables = self.inner.tables.lock();

        if tables.users.contains_key(&params.username) {
            return Err(StoreError::UniqueViolation(
                "duplicate key value violates unique constraint \"users_pkey\"".to_string(),
            ));
        }
        if tables.users.values().any(|u| u.email == params.email) {
            return Err(StoreError::UniqueViolation(
                "duplicate key value violates unique constraint \"users_email_key\"".to_string(),
            ));
        }

        let user = User {
            username: params.username,
            hashed_password: params.hashed_password,
            full_name: params.full_name,
            email: params.email,
            password_changed_at: password_never_changed(),
            created_at: Utc::now(),
        };
        tables.users.insert(user.username.clone(), user.clone());

        Ok(user)
    }

    async fn get_user(&self, username: &str) -> StoreResult<User> {
        let tables = self.inner.tables.lock();
        tables.users.get(username).cloned().ok_or(StoreError::NotFound)
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            inner: self.inner.clone(),
            held: HashMap::new(),
            transfers: Vec::new(),
            entries: Vec::new(),
            deltas: BTreeMap::new(),
        }))
    }
}

/// Staged writes plus the row locks taken so far.
///
/// Locks are released when the unit of work is dropped, which is also what
/// happens on commit, rollback, or cancellation.
pub struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    held: HashMap<i64, OwnedMutexGuard<()>>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
    deltas: BTreeMap<i64, i64>,
}

impl MemoryUnitOfWork {
    /// Committed row plus this unit of work's own pending delta
    fn visible_account(&self, tables: &Tables, id: i64) -> StoreResult<Account> {
        let mut account = tables.account(id)?.clone();
        if let Some(delta) = self.deltas.get(&id) {
            account.balance = checked_balance(account.balance, *delta)?;
        }
        Ok(account)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn get_account(&mut self, id: i64) -> StoreResult<Account> {
        let tables = self.inner.tables.lock();
        self.visible_account(&tables, id)
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StoreResult<Transfer> {
        self.inner.check(StoreOp::CreateTransfer)?;

        let transfer = new_transfer(&mut self.inner.tables.lock(), params)?;
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StoreResult<Entry> {
        self.inner.check(StoreOp::CreateEntry)?;

        let entry = new_entry(&mut self.inner.tables.lock(), params)?;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> StoreResult<Account> {
        self.inner.check(StoreOp::AddAccountBalance)?;

        if !self.held.contains_key(&params.id) {
            let guard = self.inner.row_lock(params.id).lock_owned().await;
            self.held.insert(params.id, guard);
        }

        let tables = self.inner.tables.lock();
        let mut account = self.visible_account(&tables, params.id)?;
        account.balance = checked_balance(account.balance, params.delta)?;
        drop(tables);

        *self.deltas.entry(params.id).or_insert(0) += params.delta;
        Ok(account)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.check(StoreOp::Commit)?;

        let mut tables = self.inner.tables.lock();

        // Validate everything before touching anything.
        let mut balances = Vec::with_capacity(self.deltas.len());
        for (id, delta) in &self.deltas {
            let current = tables.account(*id)?.balance;
            balances.push((*id, checked_balance(current, *delta)?));
        }

        for (id, balance) in balances {
            if let Some(account) = tables.accounts.get_mut(&id) {
                account.balance = balance;
            }
        }
        for transfer in &self.transfers {
            tables.transfers.insert(transfer.id, transfer.clone());
        }
        for entry in &self.entries {
            tables.entries.insert(entry.id, entry.clone());
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.check(StoreOp::Rollback)
    }
}

fn new_entry(tables: &mut Tables, params: CreateEntryParams) -> StoreResult<Entry> {
    tables.require_account(params.account_id, "entries_account_id_fkey")?;

    Ok(Entry {
        id: tables.next_entry_id(),
        account_id: params.account_id,
        amount: params.amount,
        created_at: Utc::now(),
    })
}

fn new_transfer(tables: &mut Tables, params: CreateTransferParams) -> StoreResult<Transfer> {
    if params.amount <= 0 {
        return Err(StoreError::Unknown(
            "new row for relation \"transfers\" violates check constraint \"transfers_amount_check\""
                .to_string(),
        ));
    }
    tables.require_account(params.from_account_id, "transfers_from_account_id_fkey")?;
    tables.require_account(params.to_account_id, "transfers_to_account_id_fkey")?;

    Ok(Transfer {
        id: tables.next_transfer_id(),
        from_account_id: params.from_account_id,
        to_account_id: params.to_account_id,
        amount: params.amount,
        created_at: Utc::now(),
    })
}

fn checked_balance(balance: i64, delta: i64) -> StoreResult<i64> {
    balance
        .checked_add(delta)
        .ok_or_else(|| StoreError::Unknown("bigint out of range".to_string()))
}

fn page_bound(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}
