//! Shared fixtures for metro-cal integration tests
#![allow(dead_code)]

use chrono::NaiveDate;
use metro_cal::db::tenants;
use metro_cal::models::{
    CalibrationDetails, CalibrationSubmission, InstrumentFields, Measurement, Profile, Tenant, User,
};
use metro_common::db::init_memory_database;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fresh in-memory database with one tenant
pub struct Fixture {
    pub pool: SqlitePool,
    pub tenant_id: Uuid,
}

pub async fn setup() -> Fixture {
    let pool = init_memory_database()
        .await
        .expect("Should create in-memory database");
    let tenant_id = add_tenant(&pool, "Acme Metrology").await;
    Fixture { pool, tenant_id }
}

pub async fn add_tenant(pool: &SqlitePool, name: &str) -> Uuid {
    let tenant = Tenant::new(name);
    let mut conn = pool.acquire().await.unwrap();
    tenants::insert_tenant(&mut conn, &tenant).await.unwrap();
    tenant.id
}

/// Profile plus one user on it
pub async fn add_user(
    pool: &SqlitePool,
    tenant_id: Uuid,
    name: &str,
    email: &str,
    calibration_admin: bool,
    active: bool,
) -> User {
    let profile = Profile::new(tenant_id, format!("{} profile", name), calibration_admin);
    let user = User::new(&profile, name, email, active);

    let mut conn = pool.acquire().await.unwrap();
    tenants::insert_profile(&mut conn, &profile).await.unwrap();
    tenants::insert_user(&mut conn, &user).await.unwrap();
    user
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn fields(code: &str, frequency: u32, repetition_ceiling: u32) -> InstrumentFields {
    InstrumentFields {
        code: code.to_string(),
        name: format!("Instrument {}", code),
        location: Some("Lab 1".to_string()),
        manufacturer: None,
        resolution: Some("0.01 mm".to_string()),
        frequency,
        repetition_ceiling,
    }
}

pub fn submission(
    instrument: InstrumentFields,
    certificate: &str,
    (error, uncertainty, tolerance): (&str, &str, &str),
    performed_at: NaiveDate,
) -> CalibrationSubmission {
    CalibrationSubmission {
        instrument,
        details: CalibrationDetails {
            certificate_number: certificate.to_string(),
            measurement: Measurement::parse(error, uncertainty, tolerance).unwrap(),
            observation: None,
            certificate_ref: None,
            performed_at,
        },
        recorded_by: None,
    }
}

/// Measurement that passes
pub const PASS: (&str, &str, &str) = ("0.2", "0.1", "0.5");
/// Measurement that fails
pub const FAIL: (&str, &str, &str) = ("0.4", "0.2", "0.5");
