//! In-Memory Store Implementation
//!
//! Mirrors the PostgreSQL behaviour the ledger relies on:
//! - writes stay private to their transaction until commit
//! - a balance update takes the account's row lock and holds it until
//!   commit or rollback
//! - a lock wait longer than the configured timeout fails as retryable
//! - IDs come from sequences that are not rolled back

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use kernel::id::{AccountId, EntryId, TransferId};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::entities::{Account, Entry, NewAccount, Transfer};
use crate::domain::repository::{LedgerQueries, LedgerStore};
use crate::domain::value_objects::{Amount, Page};
use crate::error::{ConstraintKind, LedgerError, LedgerResult};

/// In-memory ledger store; clones share the same data
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<RowLock<()>>>>,
    lock_wait_timeout: Duration,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<EntryId, Entry>,
    transfers: BTreeMap<TransferId, Transfer>,
    account_seq: i64,
    entry_seq: i64,
    transfer_seq: i64,
}

impl InMemoryLedgerStore {
    pub fn new(lock_wait_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                lock_wait_timeout,
            }),
        }
    }
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_locks(&self) -> MutexGuard<'_, HashMap<AccountId, Arc<RowLock<()>>>> {
        self.row_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, id: AccountId) -> Arc<RowLock<()>> {
        self.row_locks().entry(id).or_default().clone()
    }
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

fn page_slice<T>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    let offset = usize::try_from(page.offset).unwrap_or(0);
    let limit = usize::try_from(page.limit).unwrap_or(0);
    rows.skip(offset).take(limit).collect()
}

fn unique_violation(account: &NewAccount) -> LedgerError {
    LedgerError::ConstraintViolation {
        kind: ConstraintKind::Unique,
        constraint: Some("accounts_owner_currency_key".to_owned()),
        detail: format!(
            "account for owner {:?} in {} already exists",
            account.owner, account.currency
        ),
    }
}

fn missing_account(constraint: &str, id: AccountId) -> LedgerError {
    LedgerError::ConstraintViolation {
        kind: ConstraintKind::ForeignKey,
        constraint: Some(constraint.to_owned()),
        detail: format!("account {id} does not exist"),
    }
}

fn transfer_references(from: AccountId, to: AccountId) -> [(&'static str, AccountId); 2] {
    [
        ("transfers_from_account_fkey", from),
        ("transfers_to_account_fkey", to),
    ]
}

fn account_in_use(id: AccountId) -> LedgerError {
    LedgerError::ConstraintViolation {
        kind: ConstraintKind::ForeignKey,
        constraint: Some("entries_account_id_fkey".to_owned()),
        detail: format!("account {id} is still referenced by entries or transfers"),
    }
}

/// One open in-memory transaction
pub struct MemoryTx {
    shared: Arc<Shared>,
    locks: HashMap<AccountId, OwnedMutexGuard<()>>,
    /// Account rows written by this transaction; `None` marks a deletion
    accounts: BTreeMap<AccountId, Option<Account>>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl MemoryTx {
    /// Account row as this transaction sees it
    fn visible(&self, id: AccountId) -> Option<Account> {
        match self.accounts.get(&id) {
            Some(written) => written.clone(),
            None => self.shared.tables().accounts.get(&id).cloned(),
        }
    }

    async fn lock_row(&mut self, id: AccountId) -> LedgerResult<()> {
        if self.locks.contains_key(&id) {
            return Ok(());
        }
        let lock = self.shared.row_lock(id);
        match tokio::time::timeout(self.shared.lock_wait_timeout, lock.lock_owned()).await {
            Ok(guard) => {
                self.locks.insert(id, guard);
                Ok(())
            }
            Err(_) => {
                tracing::warn!(account_id = %id, "Row lock wait timed out");
                Err(LedgerError::LockTimeout {
                    operation: "lock_account",
                })
            }
        }
    }

    /// Lock, read and rewrite one account row
    async fn update_row<F>(&mut self, id: AccountId, update: F) -> LedgerResult<Account>
    where
        F: FnOnce(&Account) -> LedgerResult<i64> + Send,
    {
        self.lock_row(id).await?;
        let mut account = self
            .visible(id)
            .ok_or_else(|| LedgerError::not_found("account", id))?;
        account.balance = update(&account)?;
        self.accounts.insert(id, Some(account.clone()));
        Ok(account)
    }

    /// Committed entries or transfers still pointing at `id`
    fn validate_deletable(&self, id: AccountId) -> LedgerResult<()> {
        let tables = self.shared.tables();
        let referenced = tables.entries.values().any(|e| e.account_id == id)
            || tables
                .transfers
                .values()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced {
            return Err(account_in_use(id));
        }
        Ok(())
    }

    /// Re-check constraints against the latest committed state
    fn validate(&self, tables: &Tables) -> LedgerResult<()> {
        let exists = |id: AccountId| match self.accounts.get(&id) {
            Some(written) => written.is_some(),
            None => tables.accounts.contains_key(&id),
        };

        for (id, written) in &self.accounts {
            match written {
                Some(account) if !tables.accounts.contains_key(id) => {
                    let taken = tables.accounts.values().any(|other| {
                        other.owner == account.owner && other.currency == account.currency
                    });
                    if taken {
                        return Err(unique_violation(&NewAccount {
                            owner: account.owner.clone(),
                            currency: account.currency,
                        }));
                    }
                }
                Some(_) => {}
                None => {
                    let referenced = tables.entries.values().any(|e| e.account_id == *id)
                        || tables
                            .transfers
                            .values()
                            .any(|t| t.from_account_id == *id || t.to_account_id == *id);
                    if referenced {
                        return Err(account_in_use(*id));
                    }
                }
            }
        }

        for entry in &self.entries {
            if !exists(entry.account_id) {
                return Err(missing_account("entries_account_id_fkey", entry.account_id));
            }
        }
        for transfer in &self.transfers {
            let references =
                transfer_references(transfer.from_account_id, transfer.to_account_id);
            for (constraint, id) in references {
                if !exists(id) {
                    return Err(missing_account(constraint, id));
                }
            }
        }
        Ok(())
    }
}

impl LedgerQueries for MemoryTx {
    async fn create_account(&mut self, account: &NewAccount) -> LedgerResult<Account> {
        let created = {
            let mut tables = self.shared.tables();
            let taken = tables
                .accounts
                .values()
                .filter(|a| !matches!(self.accounts.get(&a.id), Some(None)))
                .chain(self.accounts.values().flatten())
                .any(|a| a.owner == account.owner && a.currency == account.currency);
            if taken {
                return Err(unique_violation(account));
            }
            Account {
                id: AccountId::new(next_id(&mut tables.account_seq)),
                owner: account.owner.clone(),
                balance: 0,
                currency: account.currency,
                created_at: Utc::now(),
            }
        };

        // Nobody else can see the row yet, so this never waits
        self.lock_row(created.id).await?;
        self.accounts.insert(created.id, Some(created.clone()));
        Ok(created)
    }

    async fn get_account(&mut self, id: AccountId) -> LedgerResult<Account> {
        self.visible(id)
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    async fn update_account(&mut self, id: AccountId, balance: i64) -> LedgerResult<Account> {
        self.update_row(id, |_| Ok(balance)).await
    }

    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> LedgerResult<Account> {
        self.update_row(id, |account| {
            account
                .balance
                .checked_add(delta)
                .ok_or(LedgerError::BalanceOverflow(id))
        })
        .await
    }

    async fn delete_account(&mut self, id: AccountId) -> LedgerResult<()> {
        self.lock_row(id).await?;
        if self.visible(id).is_none() {
            return Err(LedgerError::not_found("account", id));
        }
        let referenced = self.entries.iter().any(|e| e.account_id == id)
            || self
                .transfers
                .iter()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced {
            return Err(account_in_use(id));
        }
        self.validate_deletable(id)?;
        self.accounts.insert(id, None);
        Ok(())
    }

    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> LedgerResult<Entry> {
        if self.visible(account_id).is_none() {
            return Err(missing_account("entries_account_id_fkey", account_id));
        }
        let entry = Entry {
            id: EntryId::new(next_id(&mut self.shared.tables().entry_seq)),
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn create_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> LedgerResult<Transfer> {
        if from == to {
            return Err(LedgerError::ConstraintViolation {
                kind: ConstraintKind::Check,
                constraint: Some("transfers_distinct_accounts".to_owned()),
                detail: format!("transfer from account {from} to itself"),
            });
        }
        for (constraint, id) in transfer_references(from, to) {
            if self.visible(id).is_none() {
                return Err(missing_account(constraint, id));
            }
        }
        let transfer = Transfer {
            id: TransferId::new(next_id(&mut self.shared.tables().transfer_seq)),
            from_account_id: from,
            to_account_id: to,
            amount: amount.get(),
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> LedgerResult<MemoryTx> {
        Ok(MemoryTx {
            shared: self.shared.clone(),
            locks: HashMap::new(),
            accounts: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        })
    }

    async fn commit(&self, tx: MemoryTx) -> LedgerResult<()> {
        let mut deleted = Vec::new();
        {
            let mut tables = tx.shared.tables();
            tx.validate(&tables)?;

            for (id, written) in &tx.accounts {
                match written {
                    Some(account) => {
                        tables.accounts.insert(*id, account.clone());
                    }
                    None => {
                        tables.accounts.remove(id);
                        deleted.push(*id);
                    }
                }
            }
            for entry in &tx.entries {
                tables.entries.insert(entry.id, entry.clone());
            }
            for transfer in &tx.transfers {
                tables.transfers.insert(transfer.id, transfer.clone());
            }
        }

        // IDs are never reused; waiters still holding the lock see the row gone
        if !deleted.is_empty() {
            let mut row_locks = tx.shared.row_locks();
            for id in &deleted {
                row_locks.remove(id);
            }
        }

        // Row locks are released only after the new rows are visible
        drop(tx);
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> LedgerResult<()> {
        tracing::debug!(
            rows = tx.accounts.len(),
            entries = tx.entries.len(),
            transfers = tx.transfers.len(),
            "Discarding in-memory transaction"
        );
        drop(tx);
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.shared
            .tables()
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    async fn list_accounts(&self, owner: &str, page: Page) -> LedgerResult<Vec<Account>> {
        let tables = self.shared.tables();
        Ok(page_slice(
            tables.accounts.values().filter(|a| a.owner == owner).cloned(),
            page,
        ))
    }

    async fn get_entry(&self, id: EntryId) -> LedgerResult<Entry> {
        self.shared
            .tables()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("entry", id))
    }

    async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>> {
        let tables = self.shared.tables();
        Ok(page_slice(
            tables
                .entries
                .values()
                .filter(|e| e.account_id == account_id)
                .cloned(),
            page,
        ))
    }

    async fn get_transfer(&self, id: TransferId) -> LedgerResult<Transfer> {
        self.shared
            .tables()
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("transfer", id))
    }

    async fn list_transfers(
        &self,
        from: AccountId,
        to: AccountId,
        page: Page,
    ) -> LedgerResult<Vec<Transfer>> {
        let tables = self.shared.tables();
        Ok(page_slice(
            tables
                .transfers
                .values()
                .filter(|t| t.from_account_id == from || t.to_account_id == to)
                .cloned(),
            page,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::value_objects::Currency;

    fn tracked(store: &InMemoryLedgerStore, id: AccountId) -> bool {
        store.shared.row_locks().contains_key(&id)
    }

    #[tokio::test]
    async fn test_deleting_an_account_forgets_its_row_lock() {
        let store = InMemoryLedgerStore::new(Duration::from_secs(1));

        let mut tx = store.begin().await.unwrap();
        let account = tx
            .create_account(&NewAccount {
                owner: "alice".into(),
                currency: Currency::Usd,
            })
            .await
            .unwrap();
        store.commit(tx).await.unwrap();
        assert!(tracked(&store, account.id));

        let mut tx = store.begin().await.unwrap();
        tx.delete_account(account.id).await.unwrap();
        store.rollback(tx).await.unwrap();
        assert!(tracked(&store, account.id));

        let mut tx = store.begin().await.unwrap();
        tx.delete_account(account.id).await.unwrap();
        store.commit(tx).await.unwrap();
        assert!(!tracked(&store, account.id));
        assert!(store.get_account(account.id).await.is_err());
    }
}
