//! Ledger Error Types
//!
//! Ledger-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use std::fmt;

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use kernel::id::{AccountId, TransferId};
use thiserror::Error;

use crate::domain::value_objects::Currency;

/// Ledger-specific result type alias
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Which database constraint rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
    NotNull,
}

impl ConstraintKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Check => "check",
            ConstraintKind::NotNull => "not null",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient backend contention other than a lock-wait timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentionReason {
    Deadlock,
    SerializationFailure,
    PoolExhausted,
}

impl fmt::Display for ContentionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentionReason::Deadlock => "deadlock detected",
            ContentionReason::SerializationFailure => "serialization failure",
            ContentionReason::PoolExhausted => "connection pool exhausted",
        })
    }
}

/// Ledger-specific error variants
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A uniqueness, foreign-key, check or not-null rule rejected the write
    #[error("{kind} constraint violated: {detail}")]
    ConstraintViolation {
        kind: ConstraintKind,
        constraint: Option<String>,
        detail: String,
    },

    /// The unit of work failed and the rollback failed too
    #[error("transaction failed ({cause}) and rollback failed ({rollback})")]
    TransactionAborted {
        #[source]
        cause: Box<LedgerError>,
        rollback: Box<LedgerError>,
    },

    /// Caller cancelled or the transaction deadline passed
    #[error("operation cancelled")]
    Cancelled,

    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Applying a delta would overflow the 64-bit balance
    #[error("balance of account {0} would overflow")]
    BalanceOverflow(AccountId),

    /// Waiting for a row lock took longer than the backend allows
    #[error("{operation}: lock wait timed out")]
    LockTimeout { operation: &'static str },

    #[error("{operation}: {reason}")]
    Contention {
        operation: &'static str,
        reason: ContentionReason,
    },

    #[error("database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("invalid page: {0}")]
    InvalidPage(String),

    #[error("invalid id: {0}")]
    InvalidId(i64),

    #[error("account {account_id} is in {actual}, not {expected}")]
    CurrencyMismatch {
        account_id: AccountId,
        expected: Currency,
        actual: Currency,
    },

    #[error("account {0} does not belong to the authenticated owner")]
    NotAccountOwner(AccountId),

    #[error("transfer {0} does not involve the authenticated owner")]
    NotTransferParty(TransferId),

    #[error("missing authenticated owner")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Get the ErrorKind for this error.
    ///
    /// A failed rollback does not change the classification: the cause decides.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::ConstraintViolation { .. } => ErrorKind::Conflict,
            LedgerError::Cancelled => ErrorKind::RequestTimeout,
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidTransfer(_)
            | LedgerError::UnsupportedCurrency(_)
            | LedgerError::InvalidPage(_)
            | LedgerError::InvalidId(_)
            | LedgerError::CurrencyMismatch { .. } => ErrorKind::BadRequest,
            LedgerError::BalanceOverflow(_) => ErrorKind::UnprocessableEntity,
            LedgerError::NotAccountOwner(_) | LedgerError::NotTransferParty(_) => {
                ErrorKind::Forbidden
            }
            LedgerError::Unauthenticated => ErrorKind::Unauthorized,
            LedgerError::LockTimeout { .. } | LedgerError::Contention { .. } => {
                ErrorKind::ServiceUnavailable
            }
            LedgerError::TransactionAborted { cause, .. } => cause.kind(),
            LedgerError::Database { .. } | LedgerError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Whether repeating the whole operation may succeed.
    ///
    /// True for backend contention: deadlock, serialization failure,
    /// lock-wait timeout and pool exhaustion.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::LockTimeout { .. } | LedgerError::Contention { .. } => true,
            LedgerError::TransactionAborted { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }

    /// The error that made the unit of work fail
    pub fn primary_cause(&self) -> &LedgerError {
        match self {
            LedgerError::TransactionAborted { cause, .. } => cause,
            other => other,
        }
    }

    /// The rollback failure, when there was one
    pub fn rollback_error(&self) -> Option<&LedgerError> {
        match self {
            LedgerError::TransactionAborted { rollback, .. } => Some(rollback),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            LedgerError::Database { operation, source } => {
                tracing::error!(operation, error = %source, "Ledger database error");
            }
            LedgerError::TransactionAborted { cause, rollback } => {
                tracing::error!(cause = %cause, rollback = %rollback, "Ledger transaction aborted");
            }
            LedgerError::Internal(msg) => {
                tracing::error!(message = %msg, "Ledger internal error");
            }
            LedgerError::LockTimeout { .. } | LedgerError::Contention { .. } => {
                tracing::warn!(error = %self, "Ledger contention");
            }
            LedgerError::NotAccountOwner(account_id) => {
                tracing::warn!(account_id = %account_id, "Access to foreign account");
            }
            _ => {
                tracing::debug!(error = %self, "Ledger error");
            }
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let kind = err.kind();
        let retryable = err.is_retryable();

        // Server-side details stay in the logs
        let mut app = if kind == ErrorKind::ServiceUnavailable {
            AppError::new(kind, "The ledger is busy").with_action("Retry the request")
        } else if kind.is_server_error() {
            AppError::new(kind, "Internal server error")
        } else {
            AppError::new(kind, err.primary_cause().to_string())
        };
        if retryable {
            app = app.retryable();
        }
        app.with_source(err)
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
