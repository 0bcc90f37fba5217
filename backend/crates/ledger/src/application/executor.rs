//! Transaction Executor
//!
//! Runs a unit of work inside one store transaction: commit on success,
//! rollback on failure or cancellation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::domain::repository::LedgerStore;
use crate::error::{LedgerError, LedgerResult};

/// Executes units of work against a [`LedgerStore`].
///
/// A unit of work is a closure that receives the transaction accessor and
/// returns a boxed future borrowing it, the same shape as
/// `sqlx::Connection::transaction`:
///
/// ```ignore
/// executor
///     .execute(move |tx| Box::pin(async move { tx.get_account(id).await }))
///     .await?;
/// ```
pub struct TxExecutor<S>
where
    S: LedgerStore,
{
    store: Arc<S>,
    tx_timeout: Duration,
}

impl<S> TxExecutor<S>
where
    S: LedgerStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, tx_timeout: Duration) -> Self {
        Self { store, tx_timeout }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `work` in a transaction bounded by the configured deadline
    pub async fn execute<T, F>(&self, work: F) -> LedgerResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, LedgerResult<T>> + Send,
    {
        self.execute_until(tokio::time::sleep(self.tx_timeout), work)
            .await
    }

    /// Run `work` in a transaction until `cancel` resolves.
    ///
    /// Work errors are returned unchanged after a successful rollback. If
    /// the rollback fails too, both errors come back as
    /// [`LedgerError::TransactionAborted`]. Cancellation rolls back before
    /// returning [`LedgerError::Cancelled`]. Commit is not raced.
    pub async fn execute_until<T, F, C>(&self, cancel: C, work: F) -> LedgerResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, LedgerResult<T>> + Send,
        C: Future<Output = ()> + Send,
    {
        tokio::pin!(cancel);

        let mut tx = tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::warn!("Cancelled before the transaction began");
                return Err(LedgerError::Cancelled);
            }
            tx = self.store.begin() => tx?,
        };

        let outcome = tokio::select! {
            biased;
            _ = &mut cancel => None,
            result = work(&mut tx) => Some(result),
        };

        match outcome {
            Some(Ok(value)) => {
                self.store.commit(tx).await?;
                Ok(value)
            }
            Some(Err(cause)) => Err(self.abort(tx, cause).await),
            None => Err(self.abort(tx, LedgerError::Cancelled).await),
        }
    }

    async fn abort(&self, tx: S::Tx, cause: LedgerError) -> LedgerError {
        match self.store.rollback(tx).await {
            Ok(()) => {
                tracing::warn!(error = %cause, "Transaction rolled back");
                cause
            }
            Err(rollback) => {
                tracing::error!(
                    error = %cause,
                    rollback_error = %rollback,
                    "Transaction rollback failed"
                );
                LedgerError::TransactionAborted {
                    cause: Box::new(cause),
                    rollback: Box::new(rollback),
                }
            }
        }
    }
}
