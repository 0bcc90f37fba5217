//! Create Transfer Use Case
//!
//! Request-layer checks in front of the transfer orchestrator: the
//! accounts exist, the caller owns the paying account and both accounts
//! hold the requested currency.

use std::sync::Arc;

use kernel::id::AccountId;

use crate::application::executor::TxExecutor;
use crate::application::transfer::TransferFundsUseCase;
use crate::domain::entities::{Account, TransferResult};
use crate::domain::repository::LedgerStore;
use crate::domain::services::TransferPlan;
use crate::domain::value_objects::Currency;
use crate::error::{LedgerError, LedgerResult};

/// Input DTO for create transfer
#[derive(Debug, Clone)]
pub struct CreateTransferInput {
    pub owner: String,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub currency: Currency,
}

pub struct CreateTransferUseCase<S>
where
    S: LedgerStore,
{
    store: Arc<S>,
    transfer: TransferFundsUseCase<S>,
}

impl<S> CreateTransferUseCase<S>
where
    S: LedgerStore + Send + Sync + 'static,
{
    pub fn new(executor: Arc<TxExecutor<S>>) -> Self {
        Self {
            store: executor.store().clone(),
            transfer: TransferFundsUseCase::new(executor),
        }
    }

    pub async fn execute(&self, input: CreateTransferInput) -> LedgerResult<TransferResult> {
        let plan = TransferPlan::new(input.from_account_id, input.to_account_id, input.amount)?;

        let from = self.valid_account(plan.from(), input.currency).await?;
        if from.owner != input.owner {
            return Err(LedgerError::NotAccountOwner(from.id));
        }
        self.valid_account(plan.to(), input.currency).await?;

        self.transfer.execute_plan(plan).await
    }

    async fn valid_account(&self, id: AccountId, currency: Currency) -> LedgerResult<Account> {
        let account = self.store.get_account(id).await?;
        if account.currency != currency {
            return Err(LedgerError::CurrencyMismatch {
                account_id: id,
                expected: currency,
                actual: account.currency,
            });
        }
        Ok(account)
    }
}
