//! Transfer Funds Use Case

use std::future::Future;
use std::sync::Arc;

use kernel::id::AccountId;

use crate::application::executor::TxExecutor;
use crate::domain::entities::TransferResult;
use crate::domain::repository::{LedgerQueries, LedgerStore};
use crate::domain::services::TransferPlan;
use crate::error::{LedgerError, LedgerResult};

/// Moves funds between two accounts in one transaction
pub struct TransferFundsUseCase<S>
where
    S: LedgerStore,
{
    executor: Arc<TxExecutor<S>>,
}

impl<S> TransferFundsUseCase<S>
where
    S: LedgerStore + Send + Sync + 'static,
{
    pub fn new(executor: Arc<TxExecutor<S>>) -> Self {
        Self { executor }
    }

    pub async fn execute(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> LedgerResult<TransferResult> {
        let plan = TransferPlan::new(from, to, amount)?;
        self.execute_plan(plan).await
    }

    pub async fn execute_plan(&self, plan: TransferPlan) -> LedgerResult<TransferResult> {
        let result = self
            .executor
            .execute(move |tx| Box::pin(apply_transfer(tx, plan)))
            .await?;

        committed(&plan, &result);
        Ok(result)
    }

    /// Like [`execute`](Self::execute), but gives up when `cancel` resolves
    /// instead of at the configured deadline
    pub async fn execute_until<C>(
        &self,
        cancel: C,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> LedgerResult<TransferResult>
    where
        C: Future<Output = ()> + Send,
    {
        let plan = TransferPlan::new(from, to, amount)?;
        let result = self
            .executor
            .execute_until(cancel, move |tx| Box::pin(apply_transfer(tx, plan)))
            .await?;

        committed(&plan, &result);
        Ok(result)
    }
}

fn committed(plan: &TransferPlan, result: &TransferResult) {
    tracing::info!(
        transfer_id = %result.transfer.id,
        from_account_id = %plan.from(),
        to_account_id = %plan.to(),
        amount = plan.amount().get(),
        "Transfer committed"
    );
}

/// The transfer's writes, in order, against an open transaction.
///
/// Inserts run first; the two balance updates follow in ascending
/// account-ID order.
pub async fn apply_transfer<Q>(tx: &mut Q, plan: TransferPlan) -> LedgerResult<TransferResult>
where
    Q: LedgerQueries,
{
    let amount = plan.amount();

    let transfer = tx.create_transfer(plan.from(), plan.to(), amount).await?;
    let from_entry = tx.create_entry(plan.from(), amount.debit()).await?;
    let to_entry = tx.create_entry(plan.to(), amount.credit()).await?;

    let [first, second] = plan.balance_updates();
    let first = tx.add_account_balance(first.account_id, first.delta).await?;
    let second = tx.add_account_balance(second.account_id, second.delta).await?;

    let (from_account, to_account) = if first.id == plan.from() {
        (first, second)
    } else {
        (second, first)
    };

    if from_account.id != plan.from() || to_account.id != plan.to() {
        return Err(LedgerError::Internal(format!(
            "balance updates returned accounts {} and {}",
            from_account.id, to_account.id
        )));
    }

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}
