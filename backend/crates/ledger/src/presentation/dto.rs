//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use kernel::id::{AccountId, EntryId, TransferId};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{Account, Entry, Transfer, TransferResult};
use crate::domain::value_objects::Currency;

/// Request for POST /accounts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub currency: String,
}

/// Request for POST /transfers
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

/// Query string for paged listings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page_id: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: AccountId,
    pub owner: String,
    pub balance: i64,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            owner: account.owner,
            balance: account.balance,
            currency: account.currency,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Entry> for EntryResponse {
    fn from(entry: Entry) -> Self {
        Self {
            id: entry.id,
            account_id: entry.account_id,
            amount: entry.amount,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Transfer> for TransferResponse {
    fn from(transfer: Transfer) -> Self {
        Self {
            id: transfer.id,
            from_account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
            amount: transfer.amount,
            created_at: transfer.created_at,
        }
    }
}

/// Response for POST /transfers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResultResponse {
    pub transfer: TransferResponse,
    pub from_account: AccountResponse,
    pub to_account: AccountResponse,
    pub from_entry: EntryResponse,
    pub to_entry: EntryResponse,
}

impl From<TransferResult> for TransferResultResponse {
    fn from(result: TransferResult) -> Self {
        Self {
            transfer: result.transfer.into(),
            from_account: result.from_account.into(),
            to_account: result.to_account.into(),
            from_entry: result.from_entry.into(),
            to_entry: result.to_entry.into(),
        }
    }
}
