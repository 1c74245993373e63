//! HTTP API handlers for metro-cal

pub mod calibrations;
pub mod compliance;
pub mod extract;
pub mod health;
pub mod instruments;
pub mod jobs;
pub mod tenants;

pub use calibrations::{
    correct_calibration, delete_calibration, get_calibration, list_calibrations,
    record_calibration,
};
pub use compliance::{compliance_report, compliance_summary};
pub use extract::{ApiJson, TenantContext};
pub use health::health_routes;
pub use instruments::{
    create_instrument, delete_instrument, get_instrument, instrument_schedule, list_instruments,
    update_instrument,
};
pub use jobs::trigger_calibration_reminders;
pub use tenants::{create_profile, create_tenant, create_user};

use axum::Json;
use metro_common::api::OperationResult;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

/// Success envelope carrying `data` as its payload
pub(crate) fn success_with<T: Serialize>(
    message: &str,
    data: &T,
) -> ApiResult<Json<OperationResult>> {
    let value = serde_json::to_value(data)
        .map_err(|e| ApiError::Internal(format!("Response serialization failed: {}", e)))?;
    Ok(Json(OperationResult::success_with(message, value)))
}

/// Treat blank query/body strings as absent
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
