//! Domain Layer
//!
//! Ledger entities, value objects, transfer planning and store traits.

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
