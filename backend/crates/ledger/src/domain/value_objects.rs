//! Value Objects
//!
//! Immutable values validated at construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Currencies an account may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Uah,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Uah];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Uah => "UAH",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|currency| currency.as_str() == s)
            .ok_or_else(|| LedgerError::UnsupportedCurrency(s.to_owned()))
    }
}

/// Strictly positive amount in minor currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> LedgerResult<Self> {
        if value <= 0 {
            return Err(LedgerError::InvalidAmount(value));
        }
        Ok(Self(value))
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Signed delta for the paying side
    pub const fn debit(self) -> i64 {
        -self.0
    }

    /// Signed delta for the receiving side
    pub const fn credit(self) -> i64 {
        self.0
    }
}

/// Limit/offset window over an ID-ordered listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const MIN_SIZE: i64 = 5;
    pub const MAX_SIZE: i64 = 10;

    /// Build a page from a 1-based page number and a page size
    pub fn new(page_id: i64, page_size: i64) -> LedgerResult<Self> {
        if page_id < 1 {
            return Err(LedgerError::InvalidPage(format!(
                "page id must be at least 1, got {page_id}"
            )));
        }
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&page_size) {
            return Err(LedgerError::InvalidPage(format!(
                "page size must be between {} and {}, got {page_size}",
                Self::MIN_SIZE,
                Self::MAX_SIZE
            )));
        }
        let offset = (page_id - 1)
            .checked_mul(page_size)
            .ok_or_else(|| LedgerError::InvalidPage(format!("page id {page_id} is too large")))?;
        Ok(Self {
            limit: page_size,
            offset,
        })
    }
}
