//! Infrastructure Layer
//!
//! Store implementations: PostgreSQL for production, in-memory for tests
//! and local runs.

pub mod memory;
pub mod postgres;
