//! Tenant, profile and user registration
//!
//! Account management proper lives elsewhere; these endpoints only create
//! the rows the calibration module reads.

use axum::{extract::State, http::StatusCode, Json};
use metro_common::api::OperationResult;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{non_blank, success_with, ApiJson, TenantContext};
use crate::db::tenants;
use crate::error::{ApiError, ApiResult};
use crate::models::{Profile, Tenant, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub calibration_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub profile_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// POST /api/tenants
pub async fn create_tenant(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let name = required(Some(req.name), "Tenant name")?;
    let tenant = Tenant::new(name);

    let mut conn = state.db.acquire().await.map_err(metro_common::Error::from)?;
    tenants::insert_tenant(&mut conn, &tenant).await?;
    info!(tenant_id = %tenant.id, "Created tenant");

    Ok((StatusCode::CREATED, success_with("Tenant created", &tenant)?))
}

/// POST /api/profiles
pub async fn create_profile(
    State(state): State<AppState>,
    ctx: TenantContext,
    ApiJson(req): ApiJson<CreateProfileRequest>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let name = required(Some(req.name), "Profile name")?;
    let profile = Profile::new(ctx.tenant_id, name, req.calibration_admin);

    let mut conn = state.db.acquire().await.map_err(metro_common::Error::from)?;
    tenants::insert_profile(&mut conn, &profile).await?;
    info!(
        tenant_id = %ctx.tenant_id,
        profile_id = %profile.id,
        calibration_admin = profile.calibration_admin,
        "Created profile"
    );

    Ok((StatusCode::CREATED, success_with("Profile created", &profile)?))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    ctx: TenantContext,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<OperationResult>)> {
    let name = required(Some(req.name), "User name")?;
    let email = required(Some(req.email), "User e-mail")?;
    if !email.contains('@') {
        return Err(ApiError::BadRequest(format!("Invalid e-mail address '{}'", email)));
    }

    let mut conn = state.db.acquire().await.map_err(metro_common::Error::from)?;
    let profile = tenants::find_profile(&mut conn, ctx.tenant_id, req.profile_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    let user = User::new(&profile, name, email, req.active);
    tenants::insert_user(&mut conn, &user).await?;
    info!(tenant_id = %ctx.tenant_id, user_id = %user.id, "Created user");

    Ok((StatusCode::CREATED, success_with("User created", &user)?))
}

fn required(value: Option<String>, what: &str) -> ApiResult<String> {
    non_blank(value).ok_or_else(|| ApiError::BadRequest(format!("{} is required", what)))
}
