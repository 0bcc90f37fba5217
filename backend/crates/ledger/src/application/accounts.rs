//! Accounts Use Case
//!
//! Thin account surface around the store: creation, lookup, listing,
//! administrative balance overwrite and deletion.

use std::sync::Arc;

use kernel::id::AccountId;

use crate::application::executor::TxExecutor;
use crate::domain::entities::{Account, NewAccount};
use crate::domain::repository::{LedgerQueries, LedgerStore};
use crate::domain::value_objects::{Currency, Page};
use crate::error::{LedgerError, LedgerResult};

pub struct AccountsUseCase<S>
where
    S: LedgerStore,
{
    executor: Arc<TxExecutor<S>>,
}

impl<S> AccountsUseCase<S>
where
    S: LedgerStore + Send + Sync + 'static,
{
    pub fn new(executor: Arc<TxExecutor<S>>) -> Self {
        Self { executor }
    }

    pub async fn create(&self, owner: impl Into<String>, currency: Currency) -> LedgerResult<Account> {
        let new_account = NewAccount {
            owner: owner.into(),
            currency,
        };
        let account = self
            .executor
            .execute(move |tx| Box::pin(async move { tx.create_account(&new_account).await }))
            .await?;

        tracing::info!(
            account_id = %account.id,
            currency = %account.currency,
            "Account created"
        );

        Ok(account)
    }

    pub async fn get(&self, id: AccountId) -> LedgerResult<Account> {
        self.executor.store().get_account(id).await
    }

    /// Fetch an account, requiring it to belong to `owner`
    pub async fn get_owned(&self, owner: &str, id: AccountId) -> LedgerResult<Account> {
        let account = self.get(id).await?;
        if account.owner != owner {
            return Err(LedgerError::NotAccountOwner(id));
        }
        Ok(account)
    }

    pub async fn list(&self, owner: &str, page: Page) -> LedgerResult<Vec<Account>> {
        self.executor.store().list_accounts(owner, page).await
    }

    /// Administrative overwrite; transfers never use this path
    pub async fn set_balance(&self, id: AccountId, balance: i64) -> LedgerResult<Account> {
        let account = self
            .executor
            .execute(move |tx| Box::pin(async move { tx.update_account(id, balance).await }))
            .await?;

        tracing::info!(account_id = %id, balance, "Account balance overwritten");
        Ok(account)
    }

    pub async fn delete(&self, id: AccountId) -> LedgerResult<()> {
        self.executor
            .execute(move |tx| Box::pin(async move { tx.delete_account(id).await }))
            .await?;

        tracing::info!(account_id = %id, "Account deleted");
        Ok(())
    }

    pub async fn delete_owned(&self, owner: &str, id: AccountId) -> LedgerResult<()> {
        self.get_owned(owner, id).await?;
        self.delete(id).await
    }
}
