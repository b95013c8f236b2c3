//! API Routes
//!
//! HTTP endpoint definitions. Handlers validate requests, check account
//! ownership and currency, then call the store or the transfer engine.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::domain::models::{CreateAccountParams, CreateUserParams, ListAccountsParams};
use crate::domain::{Account, Currency, DomainError, Entry, OperationContext, Transfer, User};
use crate::engine::{TransferParams, TransferResult};
use crate::error::{AppError, AppResult};

use super::middleware::REQUEST_USER_HEADER;
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub currency_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListAccountsQuery {
    pub page_id: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency_code: String,
}

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    fn new(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

const MIN_PAGE_SIZE: i64 = 5;
const MAX_PAGE_SIZE: i64 = 10;

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:username", get(get_user))
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/:id", get(get_account).delete(delete_account))
        .route("/transfers", post(create_transfer))
        .route("/transfers/:id", get(get_transfer))
        .route("/entries/:id", get(get_entry))
}

// =========================================================================
// Users
// =========================================================================

async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<User>>)> {
    if request.username.trim().is_empty() {
        return Err(AppError::InvalidRequest("username is required".to_string()));
    }
    if !request.email.contains('@') {
        return Err(AppError::InvalidRequest("email is invalid".to_string()));
    }

    let user = state
        .store
        .create_user(CreateUserParams {
            username: request.username,
            hashed_password: request.hashed_password,
            full_name: request.full_name,
            email: request.email,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        SuccessResponse::new("user created successfully", user),
    ))
}

async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<SuccessResponse<User>>> {
    let user = state
        .store
        .get_user(&username)
        .await
        .map_err(|e| AppError::from_store(e, format!("User [{}]", username)))?;

    Ok(SuccessResponse::new("retrieved user successfully", user))
}

// =========================================================================
// Accounts
// =========================================================================

async fn create_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreateAccountRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<Account>>)> {
    let owner = request_user(&context)?;
    let currency: Currency = request.currency_code.parse()?;

    let account = state
        .store
        .create_account(CreateAccountParams {
            owner: owner.to_string(),
            currency_code: currency.code().to_string(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        SuccessResponse::new("account created successfully", account),
    ))
}

async fn get_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse<Account>>> {
    let owner = request_user(&context)?;
    let account = owned_account(&state, id, owner).await?;

    Ok(SuccessResponse::new("retrieved account successfully", account))
}

async fn list_accounts(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<ListAccountsQuery>,
) -> AppResult<Json<SuccessResponse<Vec<Account>>>> {
    let owner = request_user(&context)?;

    if query.page_id < 1 {
        return Err(DomainError::InvalidPagination("page_id must be at least 1".to_string()).into());
    }
    if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&query.page_size) {
        return Err(DomainError::InvalidPagination(format!(
            "page_size must be between {} and {}",
            MIN_PAGE_SIZE, MAX_PAGE_SIZE
        ))
        .into());
    }

    let offset = (query.page_id - 1)
        .checked_mul(query.page_size)
        .ok_or_else(|| DomainError::InvalidPagination("page_id is too large".to_string()))?;
    let accounts = state
        .store
        .list_accounts(ListAccountsParams {
            owner: owner.to_string(),
            offset,
            limit: query.page_size,
        })
        .await?;

    Ok(SuccessResponse::new(
        format!(
            "retrieved accounts from offset {} with size {}",
            offset, query.page_size
        ),
        accounts,
    ))
}

async fn delete_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse<Option<()>>>> {
    let owner = request_user(&context)?;
    owned_account(&state, id, owner).await?;

    state.store.delete_account(id).await?;

    Ok(SuccessResponse::new(
        format!("deleted account with id ({}) successfully", id),
        None,
    ))
}

// =========================================================================
// Transfers
// =========================================================================

async fn create_transfer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<TransferRequest>,
) -> AppResult<Json<SuccessResponse<TransferResult>>> {
    let owner = request_user(&context)?;

    for id in [request.from_account_id, request.to_account_id] {
        if id < 1 {
            return Err(DomainError::InvalidAccountId(id).into());
        }
    }
    if request.amount <= 0 {
        return Err(DomainError::InvalidAmount(request.amount).into());
    }
    let currency: Currency = request.currency_code.parse()?;

    let from_account = account_in_currency(&state, request.from_account_id, currency).await?;
    if from_account.owner != owner {
        return Err(DomainError::NotAccountOwner(from_account.id).into());
    }
    account_in_currency(&state, request.to_account_id, currency).await?;

    let result = state
        .engine
        .execute(TransferParams::new(
            request.from_account_id,
            request.to_account_id,
            request.amount,
        ))
        .await?;

    tracing::info!(
        transfer_id = result.transfer.id,
        correlation_id = ?context.correlation_id,
        "Transfer completed"
    );

    Ok(SuccessResponse::new(
        "transaction initiated successfully",
        result,
    ))
}

async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse<Transfer>>> {
    let transfer = state
        .store
        .get_transfer(id)
        .await
        .map_err(|e| AppError::from_store(e, format!("Transfer [{}]", id)))?;

    Ok(SuccessResponse::new("retrieved transfer successfully", transfer))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse<Entry>>> {
    let entry = state
        .store
        .get_entry(id)
        .await
        .map_err(|e| AppError::from_store(e, format!("Entry [{}]", id)))?;

    Ok(SuccessResponse::new("retrieved entry successfully", entry))
}

// =========================================================================
// Helpers
// =========================================================================

fn request_user(context: &OperationContext) -> AppResult<&str> {
    context
        .request_user
        .as_deref()
        .ok_or_else(|| AppError::MissingHeader(REQUEST_USER_HEADER.to_string()))
}

async fn owned_account(state: &AppState, id: i64, owner: &str) -> AppResult<Account> {
    let account = state
        .store
        .get_account(id)
        .await
        .map_err(|e| AppError::from_store(e, format!("Account [{}]", id)))?;

    if account.owner != owner {
        return Err(DomainError::NotAccountOwner(id).into());
    }
    Ok(account)
}

async fn account_in_currency(state: &AppState, id: i64, currency: Currency) -> AppResult<Account> {
    let account = state
        .store
        .get_account(id)
        .await
        .map_err(|e| AppError::from_store(e, format!("Account [{}]", id)))?;

    if account.currency_code != currency.code() {
        return Err(DomainError::currency_mismatch(id, &account.currency_code, currency.code()).into());
    }
    Ok(account)
}
