//! metro-cal library - calibration control service
//!
//! Instrument and calibration records, the schedule of due dates derived
//! from them, compliance classification and the monthly reminder job.

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::NotificationJob;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Reminder job, absent when no dispatch endpoint is configured
    pub reminders: Option<Arc<NotificationJob>>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            reminders: None,
            startup_time: metro_common::time::now(),
        }
    }

    pub fn with_reminders(mut self, job: Arc<NotificationJob>) -> Self {
        self.reminders = Some(job);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/tenants", post(api::create_tenant))
        .route("/api/profiles", post(api::create_profile))
        .route("/api/users", post(api::create_user))
        .route(
            "/api/instruments",
            get(api::list_instruments).post(api::create_instrument),
        )
        .route(
            "/api/instruments/:id",
            get(api::get_instrument)
                .put(api::update_instrument)
                .delete(api::delete_instrument),
        )
        .route("/api/instruments/:id/schedule", get(api::instrument_schedule))
        .route(
            "/api/calibrations",
            get(api::list_calibrations).post(api::record_calibration),
        )
        .route(
            "/api/calibrations/:id",
            get(api::get_calibration)
                .put(api::correct_calibration)
                .delete(api::delete_calibration),
        )
        .route("/api/compliance", get(api::compliance_report))
        .route("/api/compliance/summary", get(api::compliance_summary))
        .route(
            "/api/jobs/calibration-reminders",
            post(api::trigger_calibration_reminders),
        );

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
