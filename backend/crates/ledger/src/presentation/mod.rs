//! Presentation Layer
//!
//! HTTP handlers, DTOs and request extractors.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod router;
