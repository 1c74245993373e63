//! Manual trigger of the monthly reminder sweep

use axum::{extract::State, http::StatusCode, Json};
use metro_common::api::OperationResult;

use super::success_with;
use crate::error::{ApiError, ApiResult};
use crate::services::SweepOutcome;
use crate::AppState;

/// POST /api/jobs/calibration-reminders
///
/// Runs the sweep for the current month and returns its report.
pub async fn trigger_calibration_reminders(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let job = state.reminders.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Calibration reminders are not configured".to_string())
    })?;

    match job.run_sweep(metro_common::time::today()).await? {
        SweepOutcome::Completed(report) => Ok((
            StatusCode::ACCEPTED,
            success_with("Calibration reminder sweep finished", &report)?,
        )),
        SweepOutcome::AlreadyRunning => Err(ApiError::Conflict(
            "Calibration reminder sweep already running".to_string(),
        )),
    }
}
