//! Tenant, profile and user persistence

use metro_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::parse_uuid;
use crate::models::{Profile, Tenant, User};

pub async fn insert_tenant(conn: &mut SqliteConnection, tenant: &Tenant) -> Result<()> {
    sqlx::query("INSERT INTO tenants (id, name) VALUES (?, ?)")
        .bind(tenant.id.to_string())
        .bind(&tenant.name)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Load a live tenant
pub async fn find_tenant(conn: &mut SqliteConnection, tenant_id: Uuid) -> Result<Option<Tenant>> {
    let row = sqlx::query("SELECT id, name FROM tenants WHERE id = ? AND deleted = 0")
        .bind(tenant_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            Ok(Some(Tenant {
                id: parse_uuid(&id)?,
                name: row.get("name"),
            }))
        }
        None => Ok(None),
    }
}

pub async fn insert_profile(conn: &mut SqliteConnection, profile: &Profile) -> Result<()> {
    sqlx::query(
        "INSERT INTO profiles (id, tenant_id, name, calibration_admin) VALUES (?, ?, ?, ?)",
    )
    .bind(profile.id.to_string())
    .bind(profile.tenant_id.to_string())
    .bind(&profile.name)
    .bind(profile.calibration_admin)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_profile(
    conn: &mut SqliteConnection,
    tenant_id: Uuid,
    profile_id: Uuid,
) -> Result<Option<Profile>> {
    let row = sqlx::query(
        "SELECT id, tenant_id, name, calibration_admin FROM profiles WHERE id = ? AND tenant_id = ?",
    )
    .bind(profile_id.to_string())
    .bind(tenant_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let tenant: String = row.get("tenant_id");
            Ok(Some(Profile {
                id: parse_uuid(&id)?,
                tenant_id: parse_uuid(&tenant)?,
                name: row.get("name"),
                calibration_admin: row.get("calibration_admin"),
            }))
        }
        None => Ok(None),
    }
}

pub async fn insert_user(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, tenant_id, profile_id, name, email, active) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id.to_string())
    .bind(user.tenant_id.to_string())
    .bind(user.profile_id.to_string())
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.active)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Active users of a tenant whose profile administers calibrations
pub async fn calibration_admins(conn: &mut SqliteConnection, tenant_id: Uuid) -> Result<Vec<User>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.tenant_id, u.profile_id, u.name, u.email, u.active
        FROM users u
        JOIN profiles p ON p.id = u.profile_id
        WHERE u.tenant_id = ?
          AND u.active = 1
          AND u.deleted = 0
          AND p.calibration_admin = 1
        ORDER BY u.name
        "#,
    )
    .bind(tenant_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(user_from_row).collect()
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let tenant: String = row.get("tenant_id");
    let profile: String = row.get("profile_id");

    Ok(User {
        id: parse_uuid(&id)?,
        tenant_id: parse_uuid(&tenant)?,
        profile_id: parse_uuid(&profile)?,
        name: row.get("name"),
        email: row.get("email"),
        active: row.get("active"),
    })
}
