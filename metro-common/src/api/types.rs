//! Shared API request/response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured result returned by every mutating operation
///
/// Failures always carry `status: false` plus a human-readable reason; the
/// HTTP layer picks the status code.
///
/// # Examples
///
/// ```
/// use metro_common::api::types::OperationResult;
///
/// let failure = OperationResult::failure("Certificate already registered");
/// assert!(!failure.status);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationResult {
    /// true on success
    pub status: bool,
    /// Human-readable message
    pub message: String,
    /// Optional payload on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OperationResult {
    /// Successful result without payload
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: None,
        }
    }

    /// Successful result carrying a JSON payload
    pub fn success_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failure descriptor
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            data: None,
        }
    }
}
