//! Compliance dashboard endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use super::TenantContext;
use crate::error::ApiResult;
use crate::services::compliance::{self, ComplianceReport};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub overdue: u64,
    pub upcoming: u64,
    pub within_term: u64,
    pub total: u64,
}

/// GET /api/compliance
pub async fn compliance_report(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> ApiResult<Json<ComplianceReport>> {
    let report =
        compliance::evaluate_tenant(&state.db, ctx.tenant_id, metro_common::time::now()).await?;
    Ok(Json(report))
}

/// GET /api/compliance/summary
pub async fn compliance_summary(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> ApiResult<Json<SummaryResponse>> {
    let summary = compliance::evaluate_tenant(&state.db, ctx.tenant_id, metro_common::time::now())
        .await?
        .summary;

    Ok(Json(SummaryResponse {
        overdue: summary.overdue,
        upcoming: summary.upcoming,
        within_term: summary.within_term,
        total: summary.total(),
    }))
}
