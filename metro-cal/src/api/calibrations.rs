//! Calibration endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use metro_common::api::OperationResult;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{non_blank, success_with, ApiJson, TenantContext};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Calibration, CalibrationCorrection, CalibrationDetails, CalibrationFilter,
    CalibrationSubmission, InstrumentFields, Measurement, Outcome,
};
use crate::services::lifecycle::{self, HistoryPage};
use crate::services::CalibrationError;
use crate::AppState;

/// Decimal field sent either as a JSON string or a JSON number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DecimalInput {
    Text(String),
    Number(serde_json::Number),
}

impl DecimalInput {
    fn as_text(&self) -> String {
        match self {
            DecimalInput::Text(text) => text.clone(),
            DecimalInput::Number(number) => number.to_string(),
        }
    }
}

fn parse_measurement(
    error: &DecimalInput,
    uncertainty: &DecimalInput,
    tolerance: &DecimalInput,
) -> Result<Measurement, CalibrationError> {
    Ok(Measurement::parse(
        &error.as_text(),
        &uncertainty.as_text(),
        &tolerance.as_text(),
    )?)
}

#[derive(Debug, Deserialize)]
pub struct RecordCalibrationRequest {
    /// Instrument the calibration belongs to, created or refreshed by code
    pub instrument: InstrumentFields,
    pub certificate_number: String,
    pub error: DecimalInput,
    pub uncertainty: DecimalInput,
    pub tolerance: DecimalInput,
    #[serde(default)]
    pub observation: Option<String>,
    #[serde(default)]
    pub certificate_ref: Option<String>,
    pub performed_at: NaiveDate,
}

fn parse_optional(
    field: &'static str,
    value: Option<&DecimalInput>,
) -> Result<Option<Decimal>, CalibrationError> {
    Ok(value
        .map(|v| Measurement::parse_field(field, &v.as_text()))
        .transpose()?)
}

/// Omitted fields keep their stored values
#[derive(Debug, Deserialize)]
pub struct CorrectCalibrationRequest {
    #[serde(default)]
    pub certificate_number: Option<String>,
    #[serde(default)]
    pub error: Option<DecimalInput>,
    #[serde(default)]
    pub uncertainty: Option<DecimalInput>,
    #[serde(default)]
    pub tolerance: Option<DecimalInput>,
    #[serde(default)]
    pub observation: Option<String>,
    #[serde(default)]
    pub certificate_ref: Option<String>,
    #[serde(default)]
    pub performed_at: Option<NaiveDate>,
}

/// Query parameters of the history listing
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub outcome: Option<String>,
    /// Inclusive, YYYY-MM-DD
    pub from: Option<String>,
    /// Inclusive, YYYY-MM-DD
    pub to: Option<String>,
    pub instrument_code: Option<String>,
    pub location: Option<String>,
    pub page: Option<i64>,
}

impl HistoryQuery {
    pub fn to_filter(&self) -> ApiResult<CalibrationFilter> {
        let outcome = non_blank(self.outcome.clone())
            .map(|o| o.parse::<Outcome>())
            .transpose()
            .map_err(ApiError::BadRequest)?;

        Ok(CalibrationFilter {
            outcome,
            performed_from: parse_date("from", self.from.clone())?,
            performed_to: parse_date("to", self.to.clone())?,
            instrument_code: non_blank(self.instrument_code.clone()),
            location: non_blank(self.location.clone()),
        })
    }
}

fn parse_date(name: &str, value: Option<String>) -> ApiResult<Option<NaiveDate>> {
    non_blank(value)
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|_| {
                ApiError::BadRequest(format!("Parameter {} must be a YYYY-MM-DD date", name))
            })
        })
        .transpose()
}

/// POST /api/calibrations
pub async fn record_calibration(
    State(state): State<AppState>,
    ctx: TenantContext,
    ApiJson(req): ApiJson<RecordCalibrationRequest>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let measurement = parse_measurement(&req.error, &req.uncertainty, &req.tolerance)?;

    let submission = CalibrationSubmission {
        instrument: req.instrument,
        details: CalibrationDetails {
            certificate_number: req.certificate_number,
            measurement,
            observation: non_blank(req.observation),
            certificate_ref: non_blank(req.certificate_ref),
            performed_at: req.performed_at,
        },
        recorded_by: ctx.user_id,
    };

    let recorded = lifecycle::record_calibration(&state.db, ctx.tenant_id, submission).await?;
    Ok((StatusCode::CREATED, success_with("Calibration recorded", &recorded)?))
}

/// GET /api/calibrations
pub async fn list_calibrations(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryPage>> {
    let filter = query.to_filter()?;
    let page = lifecycle::calibration_history(
        &state.db,
        ctx.tenant_id,
        &filter,
        query.page.unwrap_or(1),
    )
    .await?;
    Ok(Json(page))
}

/// GET /api/calibrations/:id
pub async fn get_calibration(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Calibration>> {
    let calibration = lifecycle::get_calibration(&state.db, ctx.tenant_id, id).await?;
    Ok(Json(calibration))
}

/// PUT /api/calibrations/:id
pub async fn correct_calibration(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<CorrectCalibrationRequest>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let correction = CalibrationCorrection {
        certificate_number: non_blank(req.certificate_number),
        error: parse_optional("error", req.error.as_ref())?,
        uncertainty: parse_optional("uncertainty", req.uncertainty.as_ref())?,
        tolerance: parse_optional("tolerance", req.tolerance.as_ref())?,
        observation: non_blank(req.observation),
        certificate_ref: non_blank(req.certificate_ref),
        performed_at: req.performed_at,
    };

    let calibration = lifecycle::correct_calibration(&state.db, ctx.tenant_id, id, correction).await?;
    Ok((StatusCode::ACCEPTED, success_with("Calibration corrected", &calibration)?))
}

/// DELETE /api/calibrations/:id
pub async fn delete_calibration(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    lifecycle::delete_calibration(&state.db, ctx.tenant_id, id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(OperationResult::success("Calibration deleted")),
    ))
}
