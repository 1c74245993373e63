//! Calibration persistence
//!
//! Measurements are stored as decimal strings and parsed back on load.

use chrono::NaiveDate;
use metro_common::{Error, Result};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::str::FromStr;
use uuid::Uuid;

use super::{parse_optional_uuid, parse_uuid};
use crate::models::{Calibration, CalibrationFilter, CalibrationListing, Measurement, Outcome};

const CALIBRATION_COLUMNS: &str = "c.id AS id, c.instrument_id AS instrument_id, \
     c.tenant_id AS tenant_id, c.certificate_number AS certificate_number, \
     c.measured_error AS measured_error, c.uncertainty AS uncertainty, c.tolerance AS tolerance, \
     c.observation AS observation, c.certificate_ref AS certificate_ref, c.outcome AS outcome, \
     c.performed_at AS performed_at, c.recorded_by AS recorded_by";

pub async fn insert(conn: &mut SqliteConnection, calibration: &Calibration) -> Result<()> {
    let m = &calibration.measurement;
    sqlx::query(
        r#"
        INSERT INTO calibrations (
            id, instrument_id, tenant_id, certificate_number,
            measured_error, uncertainty, tolerance, observation, certificate_ref,
            outcome, performed_at, recorded_by
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(calibration.id.to_string())
    .bind(calibration.instrument_id.to_string())
    .bind(calibration.tenant_id.to_string())
    .bind(&calibration.certificate_number)
    .bind(m.error.to_string())
    .bind(m.uncertainty.to_string())
    .bind(m.tolerance.to_string())
    .bind(&calibration.observation)
    .bind(&calibration.certificate_ref)
    .bind(calibration.outcome.as_str())
    .bind(calibration.performed_at)
    .bind(calibration.recorded_by.map(|id| id.to_string()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Persist a corrected calibration
pub async fn update(conn: &mut SqliteConnection, calibration: &Calibration) -> Result<()> {
    let m = &calibration.measurement;
    sqlx::query(
        r#"
        UPDATE calibrations
        SET certificate_number = ?, measured_error = ?, uncertainty = ?, tolerance = ?,
            observation = ?, certificate_ref = ?, outcome = ?, performed_at = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND tenant_id = ? AND deleted = 0
        "#,
    )
    .bind(&calibration.certificate_number)
    .bind(m.error.to_string())
    .bind(m.uncertainty.to_string())
    .bind(m.tolerance.to_string())
    .bind(&calibration.observation)
    .bind(&calibration.certificate_ref)
    .bind(calibration.outcome.as_str())
    .bind(calibration.performed_at)
    .bind(calibration.id.to_string())
    .bind(calibration.tenant_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    calibration_id: Uuid,
) -> Result<Option<Calibration>> {
    let sql = format!(
        "SELECT {} FROM calibrations c WHERE c.id = ? AND c.tenant_id = ? AND c.deleted = 0",
        CALIBRATION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(calibration_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(calibration_from_row).transpose()
}

/// Whether a live calibration of the instrument already uses `certificate`
///
/// `excluding` skips one row, for corrections of that row itself.
pub async fn certificate_exists(
    conn: &mut SqliteConnection,
    instrument_id: Uuid,
    certificate: &str,
    excluding: Option<Uuid>,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM calibrations
            WHERE instrument_id = ? AND certificate_number = ? AND deleted = 0
              AND (? IS NULL OR id <> ?)
        )
        "#,
    )
    .bind(instrument_id.to_string())
    .bind(certificate)
    .bind(excluding.map(|id| id.to_string()))
    .bind(excluding.map(|id| id.to_string()))
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Number of live calibrations of an instrument
pub async fn count_live(conn: &mut SqliteConnection, instrument_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM calibrations WHERE instrument_id = ? AND deleted = 0",
    )
    .bind(instrument_id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Flag a calibration deleted; false when no live row matched
pub async fn soft_delete(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    calibration_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE calibrations
        SET deleted = 1, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND tenant_id = ? AND deleted = 0
        "#,
    )
    .bind(calibration_id.to_string())
    .bind(tenant_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Flag every live calibration of an instrument deleted
pub async fn soft_delete_for_instrument(
    conn: &mut SqliteConnection,
    instrument_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE calibrations
        SET deleted = 1, updated_at = CURRENT_TIMESTAMP
        WHERE instrument_id = ? AND deleted = 0
        "#,
    )
    .bind(instrument_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Certificate number of the most recent live calibration
pub async fn latest_certificate(
    conn: &mut SqliteConnection,
    instrument_id: Uuid,
) -> Result<Option<String>> {
    let certificate: Option<String> = sqlx::query_scalar(
        r#"
        SELECT certificate_number FROM calibrations
        WHERE instrument_id = ? AND deleted = 0
        ORDER BY performed_at DESC, created_at DESC
        LIMIT 1
        "#,
    )
    .bind(instrument_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(certificate)
}

/// Whether a live calibration was performed on or after `since`
pub async fn performed_since(
    conn: &mut SqliteConnection,
    instrument_id: Uuid,
    since: NaiveDate,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM calibrations
            WHERE instrument_id = ? AND deleted = 0 AND performed_at >= ?
        )
        "#,
    )
    .bind(instrument_id.to_string())
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Whether a live calibration was performed in `[start, end)`
pub async fn performed_between(
    conn: &mut SqliteConnection,
    instrument_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM calibrations
            WHERE instrument_id = ? AND deleted = 0
              AND performed_at >= ? AND performed_at < ?
        )
        "#,
    )
    .bind(instrument_id.to_string())
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Number of history rows matching `filter`
pub async fn count_filtered(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    filter: &CalibrationFilter,
) -> Result<i64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COUNT(*) FROM calibrations c JOIN instruments i ON i.id = c.instrument_id",
    );
    push_filters(&mut qb, tenant_id, filter);

    let count: i64 = qb.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;
    Ok(count)
}

/// One page of history rows matching `filter`, newest first
pub async fn list_filtered(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    filter: &CalibrationFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<CalibrationListing>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {}, i.code AS instrument_code, i.name AS instrument_name, i.location AS location \
         FROM calibrations c JOIN instruments i ON i.id = c.instrument_id",
        CALIBRATION_COLUMNS
    ));
    push_filters(&mut qb, tenant_id, filter);
    qb.push(" ORDER BY c.performed_at DESC, c.certificate_number LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb.build().fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| {
            Ok(CalibrationListing {
                calibration: calibration_from_row(row)?,
                instrument_code: row.get("instrument_code"),
                instrument_name: row.get("instrument_name"),
                location: row.get("location"),
            })
        })
        .collect()
}

/// Conjunctive WHERE clause shared by the count and page queries
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, tenant_id: Uuid, filter: &CalibrationFilter) {
    qb.push(" WHERE c.deleted = 0 AND i.deleted = 0 AND c.tenant_id = ")
        .push_bind(tenant_id.to_string());

    if let Some(outcome) = filter.outcome {
        qb.push(" AND c.outcome = ").push_bind(outcome.as_str());
    }
    if let Some(from) = filter.performed_from {
        qb.push(" AND c.performed_at >= ").push_bind(from);
    }
    if let Some(to) = filter.performed_to {
        qb.push(" AND c.performed_at <= ").push_bind(to);
    }
    if let Some(code) = &filter.instrument_code {
        qb.push(" AND i.code = ").push_bind(code.clone());
    }
    if let Some(location) = &filter.location {
        qb.push(" AND i.location = ").push_bind(location.clone());
    }
}

fn calibration_from_row(row: &SqliteRow) -> Result<Calibration> {
    let id: String = row.get("id");
    let instrument: String = row.get("instrument_id");
    let tenant: String = row.get("tenant_id");
    let outcome: String = row.get("outcome");

    Ok(Calibration {
        id: parse_uuid(&id)?,
        instrument_id: parse_uuid(&instrument)?,
        tenant_id: parse_uuid(&tenant)?,
        certificate_number: row.get("certificate_number"),
        measurement: Measurement {
            error: stored_decimal(row, "measured_error")?,
            uncertainty: stored_decimal(row, "uncertainty")?,
            tolerance: stored_decimal(row, "tolerance")?,
        },
        observation: row.get("observation"),
        certificate_ref: row.get("certificate_ref"),
        outcome: outcome.parse::<Outcome>().map_err(Error::Internal)?,
        performed_at: row.try_get("performed_at")?,
        recorded_by: parse_optional_uuid(row.get("recorded_by"))?,
    })
}

fn stored_decimal(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.get(column);
    Decimal::from_str(&raw)
        .map_err(|e| Error::Internal(format!("Stored {} '{}' is not a decimal: {}", column, raw, e)))
}
