//! Repository Traits
//!
//! Interfaces for ledger persistence. Implementations are in the infra layer.

use kernel::id::{AccountId, EntryId, TransferId};

use crate::domain::entities::{Account, Entry, NewAccount, Transfer};
use crate::domain::value_objects::{Amount, Page};
use crate::error::LedgerResult;

/// Writes and reads scoped to one open transaction
#[trait_variant::make(LedgerQueries: Send)]
pub trait LocalLedgerQueries {
    /// Insert an account with balance 0
    async fn create_account(&mut self, account: &NewAccount) -> LedgerResult<Account>;

    async fn get_account(&mut self, id: AccountId) -> LedgerResult<Account>;

    /// Administrative overwrite of the balance
    async fn update_account(&mut self, id: AccountId, balance: i64) -> LedgerResult<Account>;

    /// `balance = balance + delta` as one statement under the row lock
    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> LedgerResult<Account>;

    async fn delete_account(&mut self, id: AccountId) -> LedgerResult<()>;

    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> LedgerResult<Entry>;

    async fn create_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> LedgerResult<Transfer>;
}

/// Ledger store: transaction primitive plus committed-state reads
#[trait_variant::make(LedgerStore: Send)]
pub trait LocalLedgerStore {
    /// Transaction-scoped accessor
    type Tx: LedgerQueries + Send;

    async fn begin(&self) -> LedgerResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> LedgerResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> LedgerResult<()>;

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account>;

    /// Owner's accounts ordered by ID
    async fn list_accounts(&self, owner: &str, page: Page) -> LedgerResult<Vec<Account>>;

    async fn get_entry(&self, id: EntryId) -> LedgerResult<Entry>;

    async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>>;

    async fn get_transfer(&self, id: TransferId) -> LedgerResult<Transfer>;

    /// Transfers where `from` is the payer or `to` is the payee, ordered by ID
    async fn list_transfers(
        &self,
        from: AccountId,
        to: AccountId,
        page: Page,
    ) -> LedgerResult<Vec<Transfer>>;
}
