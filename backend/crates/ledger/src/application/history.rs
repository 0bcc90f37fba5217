//! History Use Case
//!
//! Read access to committed entries and transfers.

use std::sync::Arc;

use kernel::id::{AccountId, EntryId, TransferId};

use crate::domain::entities::{Entry, Transfer};
use crate::domain::repository::LedgerStore;
use crate::domain::value_objects::Page;
use crate::error::{LedgerError, LedgerResult};

pub struct HistoryUseCase<S>
where
    S: LedgerStore,
{
    store: Arc<S>,
}

impl<S> HistoryUseCase<S>
where
    S: LedgerStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get_entry(&self, id: EntryId) -> LedgerResult<Entry> {
        self.store.get_entry(id).await
    }

    pub async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>> {
        self.store.list_entries(account_id, page).await
    }

    /// Entries of an account `owner` holds
    pub async fn list_owned_entries(
        &self,
        owner: &str,
        account_id: AccountId,
        page: Page,
    ) -> LedgerResult<Vec<Entry>> {
        let account = self.store.get_account(account_id).await?;
        if account.owner != owner {
            return Err(LedgerError::NotAccountOwner(account_id));
        }
        self.list_entries(account_id, page).await
    }

    pub async fn get_transfer(&self, id: TransferId) -> LedgerResult<Transfer> {
        self.store.get_transfer(id).await
    }

    /// A transfer `owner` is a party to, on either side
    pub async fn get_owned_transfer(&self, owner: &str, id: TransferId) -> LedgerResult<Transfer> {
        let transfer = self.get_transfer(id).await?;
        for account_id in [transfer.from_account_id, transfer.to_account_id] {
            if self.store.get_account(account_id).await?.owner == owner {
                return Ok(transfer);
            }
        }
        Err(LedgerError::NotTransferParty(id))
    }

    pub async fn list_transfers(
        &self,
        from: AccountId,
        to: AccountId,
        page: Page,
    ) -> LedgerResult<Vec<Transfer>> {
        self.store.list_transfers(from, to, page).await
    }
}
