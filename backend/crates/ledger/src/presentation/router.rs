//! Ledger Router

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::application::config::LedgerConfig;
use crate::application::executor::TxExecutor;
use crate::domain::repository::LedgerStore;
use crate::infra::postgres::PgLedgerStore;
use crate::presentation::handlers::{self, LedgerAppState};

/// Create the ledger router with the PostgreSQL store
pub fn ledger_router(store: PgLedgerStore, config: &LedgerConfig) -> Router {
    ledger_router_generic(store, config)
}

/// Create a ledger router for any store implementation
pub fn ledger_router_generic<S>(store: S, config: &LedgerConfig) -> Router
where
    S: LedgerStore + Send + Sync + 'static,
{
    let state = LedgerAppState {
        executor: Arc::new(TxExecutor::new(Arc::new(store), config.tx_timeout)),
    };

    Router::new()
        .route(
            "/accounts",
            post(handlers::create_account::<S>).get(handlers::list_accounts::<S>),
        )
        .route(
            "/accounts/{id}",
            get(handlers::get_account::<S>).delete(handlers::delete_account::<S>),
        )
        .route("/accounts/{id}/entries", get(handlers::list_entries::<S>))
        .route("/transfers", post(handlers::create_transfer::<S>))
        .route("/transfers/{id}", get(handlers::get_transfer::<S>))
        .with_state(state)
}
