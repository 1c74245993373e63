//! Shared HTTP API types
//!
//! Framework-free request/response shapes used by every metro service.
//! Each service wraps them with its own axum handlers.

pub mod types;

pub use types::OperationResult;
