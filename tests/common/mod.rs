//! Common test utilities
#![allow(dead_code)]

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use simple_bank::domain::models::{AddAccountBalanceParams, CreateAccountParams, CreateUserParams};
use simple_bank::{db, Account, RecordStore, User};

pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

pub fn random_owner() -> String {
    random_string(8)
}

pub fn random_money() -> i64 {
    rand::thread_rng().gen_range(0..=1000)
}

pub async fn create_random_user(store: &dyn RecordStore) -> User {
    let username = random_owner();
    store
        .create_user(CreateUserParams {
            username: username.clone(),
            hashed_password: random_string(32),
            full_name: random_owner(),
            email: format!("{}@example.com", username),
        })
        .await
        .expect("Failed to create user")
}

/// Create a fresh owner and a USD account holding `balance`
pub async fn create_funded_account(store: &dyn RecordStore, balance: i64) -> Account {
    let user = create_random_user(store).await;
    create_account_for(store, &user.username, "USD", balance).await
}

pub async fn create_account_for(
    store: &dyn RecordStore,
    owner: &str,
    currency_code: &str,
    balance: i64,
) -> Account {
    let account = store
        .create_account(CreateAccountParams {
            owner: owner.to_string(),
            currency_code: currency_code.to_string(),
        })
        .await
        .expect("Failed to create account");

    if balance == 0 {
        return account;
    }
    store
        .add_account_balance(AddAccountBalanceParams {
            id: account.id,
            delta: balance,
        })
        .await
        .expect("Failed to fund account")
}

/// Connect to DATABASE_URL and make sure the schema exists
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    db::apply_schema(&pool)
        .await
        .expect("Failed to apply schema");

    pool
}
