//! Database access for metro-cal
//!
//! Stateless repository functions. Each takes the connection to run on, so
//! the lifecycle engine can pass a transaction and read-only handlers a
//! pooled connection.

pub mod calibrations;
pub mod instruments;
pub mod schedule;
pub mod tenants;

use metro_common::{Error, Result};
use uuid::Uuid;

/// Parse an id stored as TEXT
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Stored id '{}' is not a UUID: {}", value, e)))
}

/// Parse an optional id stored as TEXT
pub(crate) fn parse_optional_uuid(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

/// Convert an INTEGER column holding a non-negative count
pub(crate) fn to_u32(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::Internal(format!("Stored {} out of range: {}", column, value)))
}
