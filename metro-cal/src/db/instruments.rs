//! Instrument persistence
//!
//! Every lookup ignores soft-deleted rows.

use metro_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{parse_uuid, to_u32};
use crate::models::{Instrument, InstrumentFields};

const INSTRUMENT_COLUMNS: &str = "id, tenant_id, code, name, location, manufacturer, resolution, frequency, repetition_ceiling";

pub async fn insert(conn: &mut SqliteConnection, instrument: &Instrument) -> Result<()> {
    let f = &instrument.fields;
    sqlx::query(
        r#"
        INSERT INTO instruments (
            id, tenant_id, code, name, location, manufacturer, resolution,
            frequency, repetition_ceiling
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(instrument.id.to_string())
    .bind(instrument.tenant_id.to_string())
    .bind(&f.code)
    .bind(&f.name)
    .bind(&f.location)
    .bind(&f.manufacturer)
    .bind(&f.resolution)
    .bind(i64::from(f.frequency))
    .bind(i64::from(f.repetition_ceiling))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrite the attributes of a live instrument
pub async fn update(conn: &mut SqliteConnection, instrument: &Instrument) -> Result<()> {
    let f = &instrument.fields;
    sqlx::query(
        r#"
        UPDATE instruments
        SET code = ?, name = ?, location = ?, manufacturer = ?, resolution = ?,
            frequency = ?, repetition_ceiling = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND tenant_id = ? AND deleted = 0
        "#,
    )
    .bind(&f.code)
    .bind(&f.name)
    .bind(&f.location)
    .bind(&f.manufacturer)
    .bind(&f.resolution)
    .bind(i64::from(f.frequency))
    .bind(i64::from(f.repetition_ceiling))
    .bind(instrument.id.to_string())
    .bind(instrument.tenant_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    instrument_id: Uuid,
) -> Result<Option<Instrument>> {
    let sql = format!(
        "SELECT {} FROM instruments WHERE id = ? AND tenant_id = ? AND deleted = 0",
        INSTRUMENT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(instrument_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(instrument_from_row).transpose()
}

/// Live instrument with the given business code
pub async fn find_by_code(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    code: &str,
) -> Result<Option<Instrument>> {
    let sql = format!(
        "SELECT {} FROM instruments WHERE tenant_id = ? AND code = ? AND deleted = 0",
        INSTRUMENT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(tenant_id.to_string())
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(instrument_from_row).transpose()
}

pub async fn list(conn: &mut SqliteConnection, tenant_id: Uuid) -> Result<Vec<Instrument>> {
    let sql = format!(
        "SELECT {} FROM instruments WHERE tenant_id = ? AND deleted = 0 ORDER BY code",
        INSTRUMENT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(tenant_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(instrument_from_row).collect()
}

/// Flag an instrument deleted; false when no live row matched
pub async fn soft_delete(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    instrument_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE instruments
        SET deleted = 1, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND tenant_id = ? AND deleted = 0
        "#,
    )
    .bind(instrument_id.to_string())
    .bind(tenant_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn instrument_from_row(row: &SqliteRow) -> Result<Instrument> {
    let id: String = row.get("id");
    let tenant: String = row.get("tenant_id");

    Ok(Instrument {
        id: parse_uuid(&id)?,
        tenant_id: parse_uuid(&tenant)?,
        fields: InstrumentFields {
            code: row.get("code"),
            name: row.get("name"),
            location: row.get("location"),
            manufacturer: row.get("manufacturer"),
            resolution: row.get("resolution"),
            frequency: to_u32("frequency", row.get("frequency"))?,
            repetition_ceiling: to_u32("repetition_ceiling", row.get("repetition_ceiling"))?,
        },
    })
}
