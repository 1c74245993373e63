//! Schedule (agenda) persistence
//!
//! Entries are inserted once and removed only when their instrument is
//! deleted.

use chrono::NaiveDate;
use metro_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::parse_uuid;
use crate::models::ScheduleEntry;

/// Schedule entry joined with the instrument it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledInstrument {
    pub entry: ScheduleEntry,
    pub instrument_code: String,
    pub instrument_name: String,
    pub location: Option<String>,
}

/// Insert unless an entry exists for the same (instrument, due date)
///
/// Returns the stored entry, or `None` when the pair was already scheduled.
pub async fn insert_if_absent(
    conn: &mut SqliteConnection,
    entry: &ScheduleEntry,
) -> Result<Option<ScheduleEntry>> {
    let result = sqlx::query(
        r#"
        INSERT INTO schedule_entries (id, instrument_id, tenant_id, due_date)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (instrument_id, due_date) DO NOTHING
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.instrument_id.to_string())
    .bind(entry.tenant_id.to_string())
    .bind(entry.due_date)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(
            instrument_id = %entry.instrument_id,
            due_date = %entry.due_date,
            "Schedule entry already exists"
        );
        return Ok(None);
    }

    Ok(Some(entry.clone()))
}

pub async fn list_for_instrument(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    instrument_id: Uuid,
) -> Result<Vec<ScheduleEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, instrument_id, tenant_id, due_date
        FROM schedule_entries
        WHERE instrument_id = ? AND tenant_id = ?
        ORDER BY due_date
        "#,
    )
    .bind(instrument_id.to_string())
    .bind(tenant_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Hard-delete every entry of an instrument
pub async fn delete_for_instrument(conn: &mut SqliteConnection, instrument_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM schedule_entries WHERE instrument_id = ?")
        .bind(instrument_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// All entries of a tenant's live instruments
pub async fn list_for_tenant(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
) -> Result<Vec<ScheduledInstrument>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id AS id, s.instrument_id AS instrument_id, s.tenant_id AS tenant_id,
               s.due_date AS due_date, i.code AS instrument_code,
               i.name AS instrument_name, i.location AS location
        FROM schedule_entries s
        JOIN instruments i ON i.id = s.instrument_id
        WHERE s.tenant_id = ? AND i.deleted = 0
        ORDER BY s.due_date, i.code
        "#,
    )
    .bind(tenant_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(scheduled_from_row).collect()
}

/// Entries due in `[start, end)` across live instruments of live tenants
pub async fn due_between(
    conn: &mut SqliteConnection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ScheduledInstrument>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id AS id, s.instrument_id AS instrument_id, s.tenant_id AS tenant_id,
               s.due_date AS due_date, i.code AS instrument_code,
               i.name AS instrument_name, i.location AS location
        FROM schedule_entries s
        JOIN instruments i ON i.id = s.instrument_id
        JOIN tenants t ON t.id = s.tenant_id
        WHERE s.due_date >= ? AND s.due_date < ?
          AND i.deleted = 0
          AND t.deleted = 0
        ORDER BY s.tenant_id, s.due_date, i.code
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(scheduled_from_row).collect()
}

fn entry_from_row(row: &SqliteRow) -> Result<ScheduleEntry> {
    let id: String = row.get("id");
    let instrument: String = row.get("instrument_id");
    let tenant: String = row.get("tenant_id");

    Ok(ScheduleEntry {
        id: parse_uuid(&id)?,
        instrument_id: parse_uuid(&instrument)?,
        tenant_id: parse_uuid(&tenant)?,
        due_date: row.try_get("due_date")?,
    })
}

fn scheduled_from_row(row: &SqliteRow) -> Result<ScheduledInstrument> {
    Ok(ScheduledInstrument {
        entry: entry_from_row(row)?,
        instrument_code: row.get("instrument_code"),
        instrument_name: row.get("instrument_name"),
        location: row.get("location"),
    })
}
