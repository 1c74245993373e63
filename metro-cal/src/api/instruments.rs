//! Instrument endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use metro_common::api::OperationResult;
use uuid::Uuid;

use super::{success_with, ApiJson, TenantContext};
use crate::db::instruments;
use crate::error::ApiResult;
use crate::models::{Instrument, InstrumentFields, ScheduleEntry};
use crate::services::lifecycle;
use crate::AppState;

/// GET /api/instruments
pub async fn list_instruments(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> ApiResult<Json<Vec<Instrument>>> {
    let mut conn = state.db.acquire().await.map_err(metro_common::Error::from)?;
    let rows = instruments::list(&mut conn, ctx.tenant_id).await?;
    Ok(Json(rows))
}

/// POST /api/instruments
pub async fn create_instrument(
    State(state): State<AppState>,
    ctx: TenantContext,
    ApiJson(fields): ApiJson<InstrumentFields>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let instrument = lifecycle::create_instrument(&state.db, ctx.tenant_id, fields).await?;
    Ok((StatusCode::CREATED, success_with("Instrument created", &instrument)?))
}

/// GET /api/instruments/:id
pub async fn get_instrument(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Instrument>> {
    let instrument = lifecycle::get_instrument(&state.db, ctx.tenant_id, id).await?;
    Ok(Json(instrument))
}

/// PUT /api/instruments/:id
pub async fn update_instrument(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    ApiJson(fields): ApiJson<InstrumentFields>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let instrument = lifecycle::update_instrument(&state.db, ctx.tenant_id, id, fields).await?;
    Ok((StatusCode::ACCEPTED, success_with("Instrument updated", &instrument)?))
}

/// DELETE /api/instruments/:id
///
/// Soft-deletes the instrument and its calibrations, drops its schedule.
pub async fn delete_instrument(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let removal = lifecycle::delete_instrument(&state.db, ctx.tenant_id, id).await?;
    Ok((StatusCode::ACCEPTED, success_with("Instrument deleted", &removal)?))
}

/// GET /api/instruments/:id/schedule
pub async fn instrument_schedule(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ScheduleEntry>>> {
    let entries = lifecycle::instrument_schedule(&state.db, ctx.tenant_id, id).await?;
    Ok(Json(entries))
}
