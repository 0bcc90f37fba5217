//! Application Layer
//!
//! Transaction executor and use cases.

pub mod accounts;
pub mod config;
pub mod create_transfer;
pub mod executor;
pub mod history;
pub mod transfer;
