//! Ledger Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, transfer planning, store traits
//! - `application/` - Transaction executor and use cases
//! - `infra/` - PostgreSQL and in-memory store implementations
//! - `presentation/` - HTTP handlers
//!
//! ## Consistency Model
//! - A transfer writes one transfer row, two entries and two balance deltas in one transaction
//! - Balance deltas are applied in ascending account-ID order so overlapping transfers never deadlock
//! - A balance changes only through `balance = balance + delta` under the row lock
//! - The engine never retries; contention surfaces as a retryable error

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::LedgerConfig;
pub use application::executor::TxExecutor;
pub use application::transfer::TransferFundsUseCase;
pub use domain::entities::{Account, Entry, NewAccount, Transfer, TransferResult};
pub use domain::repository::{LedgerQueries, LedgerStore};
pub use domain::value_objects::{Amount, Currency, Page};
pub use error::{LedgerError, LedgerResult};
pub use infra::memory::InMemoryLedgerStore;
pub use infra::postgres::PgLedgerStore;
pub use presentation::router::{ledger_router, ledger_router_generic};

// Re-export kernel types shared with the binary
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
pub use kernel::id::{AccountId, EntryId, TransferId};
