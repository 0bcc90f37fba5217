//! Domain Services
//!
//! Pure transfer planning: validation and lock ordering.

use kernel::id::AccountId;

use crate::domain::value_objects::Amount;
use crate::error::{LedgerError, LedgerResult};

/// A signed change to one account's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub account_id: AccountId,
    pub delta: i64,
}

/// A validated transfer between two distinct accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    from: AccountId,
    to: AccountId,
    amount: Amount,
}

impl TransferPlan {
    pub fn new(from: AccountId, to: AccountId, amount: i64) -> LedgerResult<Self> {
        if from == to {
            return Err(LedgerError::InvalidTransfer(format!(
                "account {from} cannot transfer to itself"
            )));
        }
        let amount = Amount::new(amount)?;
        Ok(Self { from, to, amount })
    }

    pub fn from(&self) -> AccountId {
        self.from
    }

    pub fn to(&self) -> AccountId {
        self.to
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Both balance deltas, lower account ID first.
    ///
    /// Every transfer takes row locks in this one global order, so two
    /// transfers over the same pair never wait on each other in a cycle.
    pub fn balance_updates(&self) -> [BalanceUpdate; 2] {
        let debit = BalanceUpdate {
            account_id: self.from,
            delta: self.amount.debit(),
        };
        let credit = BalanceUpdate {
            account_id: self.to,
            delta: self.amount.credit(),
        };
        if self.from < self.to {
            [debit, credit]
        } else {
            [credit, debit]
        }
    }
}
