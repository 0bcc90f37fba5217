//! Domain Entities

use chrono::{DateTime, Utc};
use kernel::id::{AccountId, EntryId, TransferId};

use crate::domain::value_objects::Currency;

/// A balance-holding account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    /// Minor currency units; may go negative, no overdraft rule is enforced
    pub balance: i64,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// Input for account creation; the store assigns ID, balance and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub owner: String,
    pub currency: Currency,
}

/// One side of a transfer. Negative amounts are debits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Everything a committed transfer wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
