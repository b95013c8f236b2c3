//! PostgreSQL Record Store
//!
//! Every query is a free function over any Postgres executor so the same
//! SQL runs against the pool and inside a transaction.

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, Transaction};

use crate::domain::models::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    CreateUserParams, ListAccountsParams, ListEntriesParams, ListTransfersParams,
};
use crate::domain::{Account, Entry, Transfer, User};

use super::{RecordStore, StoreResult, UnitOfWork};

/// Record store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PgStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn create_account(&self, params: CreateAccountParams) -> StoreResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner, currency_code, balance)
            VALUES ($1, $2, 0)
            RETURNING id, owner, currency_code, balance, created_at
            "#,
        )
        .bind(&params.owner)
        .bind(&params.currency_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn get_account(&self, id: i64) -> StoreResult<Account> {
        select_account(&self.pool, id).await
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> StoreResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, currency_code, balance, created_at
            FROM accounts
            WHERE owner = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&params.owner)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn delete_account(&self, id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_entry(&self, params: CreateEntryParams) -> StoreResult<Entry> {
        insert_entry(&self.pool, params).await
    }

    async fn get_entry(&self, id: i64) -> StoreResult<Entry> {
        let entry = sqlx::query_as::<_, Entry>(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn list_entries(&self, params: ListEntriesParams) -> StoreResult<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn create_transfer(&self, params: CreateTransferParams) -> StoreResult<Transfer> {
        insert_transfer(&self.pool, params).await
    }

    async fn get_transfer(&self, id: i64) -> StoreResult<Transfer> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(transfer)
    }

    async fn list_transfers(&self, params: ListTransfersParams) -> StoreResult<Vec<Transfer>> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(transfers)
    }

    async fn add_account_balance(&self, params: AddAccountBalanceParams) -> StoreResult<Account> {
        update_balance(&self.pool, params).await
    }

    async fn create_user(&self, params: CreateUserParams) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, hashed_password, full_name, email)
            VALUES ($1, $2, $3, $4)
            RETURNING username, hashed_password, full_name, email, password_changed_at, created_at
            "#,
        )
        .bind(&params.username)
        .bind(&params.hashed_password)
        .bind(&params.full_name)
        .bind(&params.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, username: &str) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT username, hashed_password, full_name, email, password_changed_at, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        // READ COMMITTED: the balance UPDATE takes a row lock, and the
        // engine's lock order keeps two transfers from waiting on each other.
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One PostgreSQL transaction. Dropping it rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn get_account(&mut self, id: i64) -> StoreResult<Account> {
        select_account(&mut *self.tx, id).await
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StoreResult<Transfer> {
        insert_transfer(&mut *self.tx, params).await
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StoreResult<Entry> {
        insert_entry(&mut *self.tx, params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> StoreResult<Account> {
        update_balance(&mut *self.tx, params).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

async fn select_account<'e, E>(executor: E, id: i64) -> StoreResult<Account>
where
    E: Executor<'e, Database = Postgres>,
{
    let account = sqlx::query_as::<_, Account>(
        "SELECT id, owner, currency_code, balance, created_at FROM accounts WHERE id = $1",
    )
    .bind(id)
    .fetch_one(executor)
    .await?;

    Ok(account)
}

async fn insert_transfer<'e, E>(executor: E, params: CreateTransferParams) -> StoreResult<Transfer>
where
    E: Executor<'e, Database = Postgres>,
{
    let transfer = sqlx::query_as::<_, Transfer>(
        r#"
        INSERT INTO transfers (from_account_id, to_account_id, amount)
        VALUES ($1, $2, $3)
        RETURNING id, from_account_id, to_account_id, amount, created_at
        "#,
    )
    .bind(params.from_account_id)
    .bind(params.to_account_id)
    .bind(params.amount)
    .fetch_one(executor)
    .await?;

    Ok(transfer)
}

async fn insert_entry<'e, E>(executor: E, params: CreateEntryParams) -> StoreResult<Entry>
where
    E: Executor<'e, Database = Postgres>,
{
    let entry = sqlx::query_as::<_, Entry>(
        r#"
        INSERT INTO entries (account_id, amount)
        VALUES ($1, $2)
        RETURNING id, account_id, amount, created_at
        "#,
    )
    .bind(params.account_id)
    .bind(params.amount)
    .fetch_one(executor)
    .await?;

    Ok(entry)
}

/// Single-statement read-add-write. A missing account yields `NotFound`.
async fn update_balance<'e, E>(executor: E, params: AddAccountBalanceParams) -> StoreResult<Account>
where
    E: Executor<'e, Database = Postgres>,
{
    let account = sqlx::query_as::<_, Account>(
        r#"
        UPDATE accounts
        SET balance = balance + $2
        WHERE id = $1
        RETURNING id, owner, currency_code, balance, created_at
        "#,
    )
    .bind(params.id)
    .bind(params.delta)
    .fetch_one(executor)
    .await?;

    Ok(account)
}
