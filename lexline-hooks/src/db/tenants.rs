//! Organization and phone number records
//!
//! Read-only from the pipeline's point of view; the insert helpers exist for
//! provisioning and tests.

use lexline_common::Result;
use sqlx::{Row, SqliteConnection};

/// Tenant-owned phone number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumberRecord {
    pub id: String,
    pub org_id: String,
    pub e164: String,
    pub inbound_enabled: bool,
}

/// Find an inbound-enabled number by its E.164 value
pub async fn find_inbound_number(
    conn: &mut SqliteConnection,
    e164: &str,
) -> Result<Option<PhoneNumberRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, org_id, e164, inbound_enabled
        FROM phone_numbers
        WHERE e164 = ? AND inbound_enabled = 1
        "#,
    )
    .bind(e164)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| PhoneNumberRecord {
        id: row.get("id"),
        org_id: row.get("org_id"),
        e164: row.get("e164"),
        inbound_enabled: row.get::<i64, _>("inbound_enabled") != 0,
    }))
}

/// Create an organization (no-op if the id exists)
pub async fn insert_organization(conn: &mut SqliteConnection, id: &str, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO organizations (id, name) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
        .bind(id)
        .bind(name)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Register a phone number for an organization
pub async fn insert_phone_number(
    conn: &mut SqliteConnection,
    record: &PhoneNumberRecord,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO phone_numbers (id, org_id, e164, inbound_enabled)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.org_id)
    .bind(&record.e164)
    .bind(record.inbound_enabled as i64)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
