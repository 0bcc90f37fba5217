//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the "smallest core" of ledger vocabulary:
//! - Common error classification and the unified application error
//! - Typed numeric identifiers for persisted entities
//!
//! **Design Principle**: Only include things that are "hard to change"
//! and have consistent meaning across all layers.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
