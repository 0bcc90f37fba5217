//! PostgreSQL Store Implementation

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::{AccountId, EntryId, TransferId};
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::{PgExecutor, PgPool, Transaction};

use crate::application::config::LedgerConfig;
use crate::domain::entities::{Account, Entry, NewAccount, Transfer};
use crate::domain::repository::{LedgerQueries, LedgerStore};
use crate::domain::value_objects::{Amount, Page};
use crate::error::{ConstraintKind, ContentionReason, LedgerError, LedgerResult};

const ACCOUNT_COLUMNS: &str = "account_id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "entry_id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "transfer_id, from_account_id, to_account_id, amount, created_at";

/// PostgreSQL-backed ledger store.
///
/// Every transaction runs with `lock_timeout` and `statement_timeout` set
/// locally, so a statement blocked on a row lock fails on the server
/// instead of outliving the caller's deadline.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    lock_wait_timeout: Duration,
    statement_timeout: Duration,
}

impl PgLedgerStore {
    /// Wrap `pool` with the default lock-wait and statement limits
    pub fn new(pool: PgPool) -> Self {
        let defaults = LedgerConfig::default();
        Self {
            pool,
            lock_wait_timeout: defaults.lock_wait_timeout,
            statement_timeout: defaults.tx_timeout,
        }
    }

    pub fn with_timeouts(
        mut self,
        lock_wait_timeout: Duration,
        statement_timeout: Duration,
    ) -> Self {
        self.lock_wait_timeout = lock_wait_timeout;
        self.statement_timeout = statement_timeout;
        self
    }

    /// Open a pool sized and timed from `config`
    pub async fn connect(database_url: &str, config: &LedgerConfig) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        tracing::info!(
            max_connections = config.max_connections,
            acquire_timeout_ms = duration_ms(config.acquire_timeout),
            lock_timeout_ms = duration_ms(config.lock_wait_timeout),
            statement_timeout_ms = duration_ms(config.tx_timeout),
            "Connected to database"
        );

        Ok(Self::new(pool).with_timeouts(config.lock_wait_timeout, config.tx_timeout))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// One open PostgreSQL transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

impl LedgerQueries for PgLedgerTx {
    async fn create_account(&mut self, account: &NewAccount) -> LedgerResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, 0, $2) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&account.owner)
        .bind(account.currency.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_account", e))?;

        row.into_account()
    }

    async fn get_account(&mut self, id: AccountId) -> LedgerResult<Account> {
        fetch_account(&mut *self.tx, id).await
    }

    async fn update_account(&mut self, id: AccountId, balance: i64) -> LedgerResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "UPDATE accounts SET balance = $2 WHERE account_id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id.get())
        .bind(balance)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_account", e))?;

        row.ok_or_else(|| LedgerError::not_found("account", id))?
            .into_account()
    }

    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> LedgerResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "UPDATE accounts SET balance = balance + $2 WHERE account_id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id.get())
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            if sqlstate(&e).as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) {
                LedgerError::BalanceOverflow(id)
            } else {
                map_sqlx_error("add_account_balance", e)
            }
        })?;

        row.ok_or_else(|| LedgerError::not_found("account", id))?
            .into_account()
    }

    async fn delete_account(&mut self, id: AccountId) -> LedgerResult<()> {
        let deleted = sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_account", e))?
            .rows_affected();

        if deleted == 0 {
            return Err(LedgerError::not_found("account", id));
        }
        Ok(())
    }

    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> LedgerResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(account_id.get())
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_entry", e))?;

        Ok(row.into_entry())
    }

    async fn create_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> LedgerResult<Transfer> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) VALUES ($1, $2, $3) RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(from.get())
        .bind(to.get())
        .bind(amount.get())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_transfer", e))?;

        Ok(row.into_transfer())
    }
}

impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> LedgerResult<PgLedgerTx> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        // Transaction-local: reset by COMMIT or ROLLBACK
        sqlx::query(
            "SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $2, true)",
        )
        .bind(format!("{}ms", duration_ms(self.lock_wait_timeout)))
        .bind(format!("{}ms", duration_ms(self.statement_timeout)))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("begin", e))?;

        Ok(PgLedgerTx { tx })
    }

    async fn commit(&self, tx: PgLedgerTx) -> LedgerResult<()> {
        tx.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(&self, tx: PgLedgerTx) -> LedgerResult<()> {
        tx.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        fetch_account(&self.pool, id).await
    }

    async fn list_accounts(&self, owner: &str, page: Page) -> LedgerResult<Vec<Account>> {
        sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = $1 ORDER BY account_id LIMIT $2 OFFSET $3"
        ))
        .bind(owner)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?
        .into_iter()
        .map(AccountRow::into_account)
        .collect()
    }

    async fn get_entry(&self, id: EntryId) -> LedgerResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE entry_id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_entry", e))?;

        row.map(EntryRow::into_entry)
            .ok_or_else(|| LedgerError::not_found("entry", id))
    }

    async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = $1 ORDER BY entry_id LIMIT $2 OFFSET $3"
        ))
        .bind(account_id.get())
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_entries", e))?;

        Ok(rows.into_iter().map(EntryRow::into_entry).collect())
    }

    async fn get_transfer(&self, id: TransferId) -> LedgerResult<Transfer> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE transfer_id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transfer", e))?;

        row.map(TransferRow::into_transfer)
            .ok_or_else(|| LedgerError::not_found("transfer", id))
    }

    async fn list_transfers(
        &self,
        from: AccountId,
        to: AccountId,
        page: Page,
    ) -> LedgerResult<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers \
             WHERE from_account_id = $1 OR to_account_id = $2 \
             ORDER BY transfer_id LIMIT $3 OFFSET $4"
        ))
        .bind(from.get())
        .bind(to.get())
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transfers", e))?;

        Ok(rows.into_iter().map(TransferRow::into_transfer).collect())
    }
}

async fn fetch_account<'e, E>(executor: E, id: AccountId) -> LedgerResult<Account>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1"
    ))
    .bind(id.get())
    .fetch_optional(executor)
    .await
    .map_err(|e| map_sqlx_error("get_account", e))?;

    row.ok_or_else(|| LedgerError::not_found("account", id))?
        .into_account()
}

// ============================================================================
// SQLSTATE mapping
// ============================================================================

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// Translate a driver error into the ledger taxonomy
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> LedgerError {
    let mapped = match &err {
        sqlx::Error::PoolTimedOut => Some(LedgerError::Contention {
            operation,
            reason: ContentionReason::PoolExhausted,
        }),
        sqlx::Error::Database(db) => {
            let constraint = |kind| LedgerError::ConstraintViolation {
                kind,
                constraint: db.constraint().map(str::to_owned),
                detail: db.message().to_owned(),
            };
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => Some(constraint(ConstraintKind::Unique)),
                Some(FOREIGN_KEY_VIOLATION) => Some(constraint(ConstraintKind::ForeignKey)),
                Some(CHECK_VIOLATION) => Some(constraint(ConstraintKind::Check)),
                Some(NOT_NULL_VIOLATION) => Some(constraint(ConstraintKind::NotNull)),
                Some(DEADLOCK_DETECTED) => Some(LedgerError::Contention {
                    operation,
                    reason: ContentionReason::Deadlock,
                }),
                Some(SERIALIZATION_FAILURE) => Some(LedgerError::Contention {
                    operation,
                    reason: ContentionReason::SerializationFailure,
                }),
                Some(LOCK_NOT_AVAILABLE) => Some(LedgerError::LockTimeout { operation }),
                Some(QUERY_CANCELED) => Some(LedgerError::Cancelled),
                _ => None,
            }
        }
        _ => None,
    };

    match mapped {
        Some(err) => err,
        None => {
            tracing::error!(operation, error = %err, "Unmapped database error");
            LedgerError::Database {
                operation,
                source: err,
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct AccountRow {
    account_id: i64,
    owner: String,
    balance: i64,
    currency: String,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> LedgerResult<Account> {
        Ok(Account {
            id: AccountId::new(self.account_id),
            owner: self.owner,
            balance: self.balance,
            currency: self.currency.parse()?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    entry_id: i64,
    account_id: i64,
    amount: i64,
    created_at: DateTime<Utc>,
}

impl EntryRow {
    fn into_entry(self) -> Entry {
        Entry {
            id: EntryId::new(self.entry_id),
            account_id: AccountId::new(self.account_id),
            amount: self.amount,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TransferRow {
    transfer_id: i64,
    from_account_id: i64,
    to_account_id: i64,
    amount: i64,
    created_at: DateTime<Utc>,
}

impl TransferRow {
    fn into_transfer(self) -> Transfer {
        Transfer {
            id: TransferId::new(self.transfer_id),
            from_account_id: AccountId::new(self.from_account_id),
            to_account_id: AccountId::new(self.to_account_id),
            amount: self.amount,
            created_at: self.created_at,
        }
    }
}
