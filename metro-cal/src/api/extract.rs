//! Request extractors
//!
//! Tenant context travels in headers; authentication happens upstream.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::db::tenants;
use crate::error::ApiError;
use crate::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Tenant (required) and recording user (optional) of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let tenant_id = header_uuid(parts, TENANT_HEADER)?
            .ok_or_else(|| ApiError::BadRequest("Missing X-Tenant-Id header".to_string()))?;
        let user_id = header_uuid(parts, USER_HEADER)?;

        let mut conn = state.db.acquire().await.map_err(metro_common::Error::from)?;
        if tenants::find_tenant(&mut conn, tenant_id).await?.is_none() {
            return Err(ApiError::NotFound("Tenant not found".to_string()));
        }

        Ok(Self { tenant_id, user_id })
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("Header {} must be a UUID", name)))
}

/// JSON body whose rejections use the API failure shape
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
