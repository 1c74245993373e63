//! # Metro Common Library
//!
//! Shared code for the metrology services including:
//! - Error type shared by every crate
//! - Bootstrap configuration loading and root folder resolution
//! - Database initialization and schema
//! - API result envelope
//! - Date helpers for calibration cycles and month windows

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
