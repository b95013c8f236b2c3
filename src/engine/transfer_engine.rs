//! Transfer Engine
//!
//! Runs one transfer as a single unit of work over a [`RecordStore`]:
//!
//! 1. insert the transfer row
//! 2. insert the debit entry for the source account
//! 3. insert the credit entry for the destination account
//! 4. apply both balance deltas, lower account id first
//!
//! Any failure rolls the whole unit of work back.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::domain::models::{AddAccountBalanceParams, CreateEntryParams, CreateTransferParams};
use crate::store::{RecordStore, StoreResult, UnitOfWork};

use super::{RetryPolicy, TransferError, TransferParams, TransferResult};

/// Engine settings, derived from [`Config`] at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Deadline for one attempt, commit included
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::none(),
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.transfer_timeout,
            retry: RetryPolicy::new(config.transfer_max_retries, config.transfer_retry_backoff),
        }
    }
}

/// Executes transfers. Safe to share across tasks.
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn RecordStore>,
    config: EngineConfig,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Move `amount` from one account to another.
    ///
    /// No deduplication: two calls with the same params make two transfers.
    pub async fn execute(&self, params: TransferParams) -> Result<TransferResult, TransferError> {
        if params.is_self_transfer() {
            tracing::warn!(
                account_id = params.from_account_id,
                amount = params.amount,
                "Self-transfer requested; balances will net to zero"
            );
        }

        let policy = self.config.retry;
        let mut attempt = 0;

        loop {
            match self.attempt(params).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        "Transient failure, retrying transfer (attempt {}/{})",
                        attempt,
                        policy.max_retries
                    );
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One bounded attempt. On timeout the in-flight unit of work is
    /// dropped, which discards its writes.
    async fn attempt(&self, params: TransferParams) -> Result<TransferResult, TransferError> {
        match tokio::time::timeout(self.config.timeout, self.run(params)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    from_account_id = params.from_account_id,
                    to_account_id = params.to_account_id,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Transfer timed out, unit of work abandoned"
                );
                Err(TransferError::Timeout(self.config.timeout))
            }
        }
    }

    async fn run(&self, params: TransferParams) -> Result<TransferResult, TransferError> {
        let mut uow = self.store.begin().await?;

        tracing::debug!(
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
            "Transfer started"
        );

        match apply_steps(uow.as_mut(), params).await {
            Ok(result) => {
                uow.commit().await?;
                tracing::debug!(transfer_id = result.transfer.id, "Transfer committed");
                Ok(result)
            }
            Err(cause) => match uow.rollback().await {
                Ok(()) => {
                    tracing::warn!(error = %cause, "Transfer rolled back");
                    Err(TransferError::Store(cause))
                }
                Err(rollback) => {
                    tracing::error!(
                        error = %cause,
                        rollback_error = %rollback,
                        "Transfer rollback failed"
                    );
                    Err(TransferError::Rollback { cause, rollback })
                }
            },
        }
    }
}

async fn apply_steps(
    uow: &mut dyn UnitOfWork,
    params: TransferParams,
) -> StoreResult<TransferResult> {
    let transfer = uow
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let from_entry = uow
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await?;

    let to_entry = uow
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let [(first_id, first_delta), (second_id, second_delta)] = params.balance_updates();
    let first = uow
        .add_account_balance(AddAccountBalanceParams {
            id: first_id,
            delta: first_delta,
        })
        .await?;
    let second = uow
        .add_account_balance(AddAccountBalanceParams {
            id: second_id,
            delta: second_delta,
        })
        .await?;

    let (from_account, to_account) = if params.from_account_id < params.to_account_id {
        (first, second)
    } else {
        (second, first)
    };

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogFormat, StoreBackend};
    use crate::domain::models::{CreateAccountParams, CreateUserParams};
    use crate::store::MemoryStore;

    fn config() -> Config {
        Config {
            database_url: None,
            database_max_connections: 10,
            store_backend: StoreBackend::Memory,
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "test".to_string(),
            log_format: LogFormat::Pretty,
            transfer_timeout: Duration::from_millis(750),
            transfer_max_retries: 3,
            transfer_retry_backoff: Duration::from_millis(20),
        }
    }

    async fn account(store: &MemoryStore, owner: &str) -> i64 {
        store
            .create_user(CreateUserParams {
                username: owner.to_string(),
                hashed_password: "hash".to_string(),
                full_name: owner.to_string(),
                email: format!("{}@example.com", owner),
            })
            .await
            .unwrap();
        store
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                currency_code: "USD".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_engine_config_from_config() {
        let engine_config = EngineConfig::from(&config());
        assert_eq!(engine_config.timeout, Duration::from_millis(750));
        assert_eq!(
            engine_config.retry,
            RetryPolicy::new(3, Duration::from_millis(20))
        );
    }

    #[test]
    fn test_default_engine_config_does_not_retry() {
        assert_eq!(EngineConfig::default().retry, RetryPolicy::none());
    }

    #[tokio::test]
    async fn test_steps_map_accounts_back_to_direction() {
        let store = MemoryStore::new();
        let low = account(&store, "low").await;
        let high = account(&store, "high").await;
        assert!(low < high);

        // Debit the higher id: its delta is applied second
        let mut uow = store.begin().await.unwrap();
        let result = apply_steps(uow.as_mut(), TransferParams::new(high, low, 5))
            .await
            .unwrap();

        assert_eq!(result.from_account.id, high);
        assert_eq!(result.from_account.balance, -5);
        assert_eq!(result.to_account.id, low);
        assert_eq!(result.to_account.balance, 5);
        assert_eq!(result.from_entry.account_id, high);
        assert_eq!(result.to_entry.account_id, low);

        // Nothing is visible until commit
        assert_eq!(store.get_account(high).await.unwrap().balance, 0);
        uow.commit().await.unwrap();
        assert_eq!(store.get_account(high).await.unwrap().balance, -5);
    }
}
