//! PostgreSQL integration tests
//!
//! Need a disposable database:
//! `DATABASE_URL=postgres://... cargo test -p ledger --test postgres -- --ignored`

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ledger::application::accounts::AccountsUseCase;
use ledger::domain::repository::{LedgerQueries, LedgerStore};
use ledger::error::ConstraintKind;
use ledger::{
    Account, AccountId, Currency, LedgerConfig, LedgerError, Page, PgLedgerStore,
    TransferFundsUseCase, TxExecutor,
};
use rand::Rng;
use rand::distr::Alphanumeric;

const ALL: Page = Page {
    limit: 100,
    offset: 0,
};

async fn executor() -> Arc<TxExecutor<PgLedgerStore>> {
    executor_with(LedgerConfig {
        max_connections: 20,
        tx_timeout: Duration::from_secs(10),
        ..LedgerConfig::default()
    })
    .await
}

async fn executor_with(config: LedgerConfig) -> Arc<TxExecutor<PgLedgerStore>> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let store = PgLedgerStore::connect(&url, &config).await.unwrap();
    sqlx::migrate!("../../../database/migrations")
        .run(store.pool())
        .await
        .unwrap();
    Arc::new(TxExecutor::new(Arc::new(store), config.tx_timeout))
}

fn random_owner() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

async fn funded(executor: &Arc<TxExecutor<PgLedgerStore>>, balance: i64) -> Account {
    let accounts = AccountsUseCase::new(executor.clone());
    let account = accounts.create(random_owner(), Currency::Usd).await.unwrap();
    accounts.set_balance(account.id, balance).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_transfers_serialize() {
    let executor = executor().await;
    let a = funded(&executor, 100).await;
    let b = funded(&executor, 200).await;

    let n = 5;
    let transfer = Arc::new(TransferFundsUseCase::new(executor.clone()));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let transfer = transfer.clone();
            tokio::spawn(async move { transfer.execute(a.id, b.id, 10).await })
        })
        .collect();

    let mut markers = HashSet::new();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        let diff_from = a.balance - result.from_account.balance;
        let diff_to = result.to_account.balance - b.balance;
        assert_eq!(diff_from, diff_to);
        assert!(markers.insert(diff_from / 10));
    }
    assert_eq!(markers, (1..=n).collect());

    let store = executor.store();
    assert_eq!(store.get_account(a.id).await.unwrap().balance, 50);
    assert_eq!(store.get_account(b.id).await.unwrap().balance, 250);
    assert_eq!(store.list_transfers(a.id, b.id, ALL).await.unwrap().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn opposite_directions_do_not_deadlock() {
    let executor = executor().await;
    let a = funded(&executor, 100).await;
    let b = funded(&executor, 100).await;

    let transfer = Arc::new(TransferFundsUseCase::new(executor.clone()));
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let transfer = transfer.clone();
            let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
            tokio::spawn(async move { transfer.execute(from, to, 10).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let store = executor.store();
    assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
    assert_eq!(store.get_account(b.id).await.unwrap().balance, 100);
}

#[tokio::test]
#[ignore]
async fn failed_transfer_leaves_no_trace() {
    let executor = executor().await;
    let a = funded(&executor, 100).await;

    let err = TransferFundsUseCase::new(executor.clone())
        .execute(a.id, AccountId::new(i64::MAX), 10)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ConstraintViolation {
            kind: ConstraintKind::ForeignKey,
            ..
        }
    ));

    let store = executor.store();
    assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
    assert!(store.list_entries(a.id, ALL).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn duplicate_account_is_unique_violation() {
    let executor = executor().await;
    let accounts = AccountsUseCase::new(executor.clone());
    let owner = random_owner();

    accounts.create(owner.clone(), Currency::Eur).await.unwrap();
    let err = accounts.create(owner, Currency::Eur).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ConstraintViolation {
            kind: ConstraintKind::Unique,
            ..
        }
    ));
}

#[tokio::test]
#[ignore]
async fn balance_overflow_is_reported() {
    let executor = executor().await;
    let a = funded(&executor, 100).await;
    let b = funded(&executor, i64::MAX).await;

    let err = TransferFundsUseCase::new(executor.clone())
        .execute(a.id, b.id, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::BalanceOverflow(id) if id == b.id));
    assert_eq!(executor.store().get_account(a.id).await.unwrap().balance, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn blocked_row_lock_fails_after_lock_timeout() {
    let executor = executor_with(LedgerConfig {
        max_connections: 4,
        tx_timeout: Duration::from_secs(10),
        lock_wait_timeout: Duration::from_millis(300),
        ..LedgerConfig::default()
    })
    .await;
    let a = funded(&executor, 100).await;
    let store = executor.store();

    let mut holder = store.begin().await.unwrap();
    holder.add_account_balance(a.id, 1).await.unwrap();

    let started = Instant::now();
    let err = executor
        .execute(move |tx| {
            Box::pin(async move { tx.add_account_balance(a.id, 1_000).await })
        })
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, LedgerError::LockTimeout { .. }), "{err:?}");
    assert!(err.is_retryable());
    assert!(elapsed < Duration::from_secs(2), "waited {elapsed:?}");

    store.rollback(holder).await.unwrap();
    assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn deadline_interrupts_statement_waiting_on_row_lock() {
    let executor = executor_with(LedgerConfig {
        max_connections: 4,
        tx_timeout: Duration::from_millis(300),
        lock_wait_timeout: Duration::from_secs(30),
        ..LedgerConfig::default()
    })
    .await;
    let a = funded(&executor, 100).await;
    let store = executor.store();

    let mut holder = store.begin().await.unwrap();
    holder.add_account_balance(a.id, 1).await.unwrap();

    let started = Instant::now();
    let err = executor
        .execute(move |tx| {
            Box::pin(async move { tx.add_account_balance(a.id, 1_000).await })
        })
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, LedgerError::Cancelled), "{err:?}");
    assert!(elapsed < Duration::from_secs(2), "waited {elapsed:?}");

    store.rollback(holder).await.unwrap();
    assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
}
