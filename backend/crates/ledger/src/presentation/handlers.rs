//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use kernel::id::{AccountId, TransferId};

use crate::application::accounts::AccountsUseCase;
use crate::application::create_transfer::{CreateTransferInput, CreateTransferUseCase};
use crate::application::executor::TxExecutor;
use crate::application::history::HistoryUseCase;
use crate::domain::repository::LedgerStore;
use crate::domain::value_objects::{Currency, Page};
use crate::error::{LedgerError, LedgerResult};
use crate::presentation::dto::{
    AccountResponse, CreateAccountRequest, CreateTransferRequest, EntryResponse, PageQuery,
    TransferResponse, TransferResultResponse,
};
use crate::presentation::extract::AuthenticatedOwner;

/// Shared state for ledger handlers
pub struct LedgerAppState<S>
where
    S: LedgerStore + Send + Sync + 'static,
{
    pub executor: Arc<TxExecutor<S>>,
}

impl<S> Clone for LedgerAppState<S>
where
    S: LedgerStore + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<S> LedgerAppState<S>
where
    S: LedgerStore + Send + Sync + 'static,
{
    fn accounts(&self) -> AccountsUseCase<S> {
        AccountsUseCase::new(self.executor.clone())
    }

    fn history(&self) -> HistoryUseCase<S> {
        HistoryUseCase::new(self.executor.store().clone())
    }
}

fn positive_id(raw: i64) -> LedgerResult<i64> {
    if raw < 1 {
        return Err(LedgerError::InvalidId(raw));
    }
    Ok(raw)
}

/// POST /accounts
pub async fn create_account<S>(
    State(state): State<LedgerAppState<S>>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
    Json(req): Json<CreateAccountRequest>,
) -> LedgerResult<(StatusCode, Json<AccountResponse>)>
where
    S: LedgerStore + Send + Sync + 'static,
{
    let currency: Currency = req.currency.parse()?;
    let account = state.accounts().create(owner, currency).await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

/// GET /accounts/{id}
pub async fn get_account<S>(
    State(state): State<LedgerAppState<S>>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
    Path(id): Path<i64>,
) -> LedgerResult<Json<AccountResponse>>
where
    S: LedgerStore + Send + Sync + 'static,
{
    let id = AccountId::new(positive_id(id)?);
    let account = state.accounts().get_owned(&owner, id).await?;
    Ok(Json(account.into()))
}

/// GET /accounts?pageId=&pageSize=
pub async fn list_accounts<S>(
    State(state): State<LedgerAppState<S>>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
    Query(query): Query<PageQuery>,
) -> LedgerResult<Json<Vec<AccountResponse>>>
where
    S: LedgerStore + Send + Sync + 'static,
{
    let page = Page::new(query.page_id, query.page_size)?;
    let accounts = state.accounts().list(&owner, page).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// DELETE /accounts/{id}
pub async fn delete_account<S>(
    State(state): State<LedgerAppState<S>>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
    Path(id): Path<i64>,
) -> LedgerResult<StatusCode>
where
    S: LedgerStore + Send + Sync + 'static,
{
    let id = AccountId::new(positive_id(id)?);
    state.accounts().delete_owned(&owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /accounts/{id}/entries?pageId=&pageSize=
pub async fn list_entries<S>(
    State(state): State<LedgerAppState<S>>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> LedgerResult<Json<Vec<EntryResponse>>>
where
    S: LedgerStore + Send + Sync + 'static,
{
    let id = AccountId::new(positive_id(id)?);
    let page = Page::new(query.page_id, query.page_size)?;
    let entries = state.history().list_owned_entries(&owner, id, page).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// POST /transfers
pub async fn create_transfer<S>(
    State(state): State<LedgerAppState<S>>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
    Json(req): Json<CreateTransferRequest>,
) -> LedgerResult<Json<TransferResultResponse>>
where
    S: LedgerStore + Send + Sync + 'static,
{
    let input = CreateTransferInput {
        owner,
        from_account_id: AccountId::new(positive_id(req.from_account_id)?),
        to_account_id: AccountId::new(positive_id(req.to_account_id)?),
        amount: req.amount,
        currency: req.currency.parse()?,
    };

    let use_case = CreateTransferUseCase::new(state.executor.clone());
    let result = use_case.execute(input).await?;

    Ok(Json(result.into()))
}

/// GET /transfers/{id}
pub async fn get_transfer<S>(
    State(state): State<LedgerAppState<S>>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
    Path(id): Path<i64>,
) -> LedgerResult<Json<TransferResponse>>
where
    S: LedgerStore + Send + Sync + 'static,
{
    let id = TransferId::new(positive_id(id)?);
    let transfer = state.history().get_owned_transfer(&owner, id).await?;
    Ok(Json(transfer.into()))
}
