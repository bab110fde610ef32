//! Contact (caller identity) persistence

use lexline_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use uuid::Uuid;

use super::parse_uuid;

/// Display name given to a contact before anyone learns the caller's name
pub const PLACEHOLDER_DISPLAY_NAME: &str = "Unknown Caller";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub id: Uuid,
    pub org_id: String,
    pub phone_e164: String,
    pub display_name: String,
}

impl ContactRecord {
    pub fn has_placeholder_name(&self) -> bool {
        self.display_name == PLACEHOLDER_DISPLAY_NAME
    }
}

fn from_row(row: &SqliteRow) -> Result<ContactRecord> {
    let id: String = row.get("id");
    Ok(ContactRecord {
        id: parse_uuid(&id)?,
        org_id: row.get("org_id"),
        phone_e164: row.get("phone_e164"),
        display_name: row.get("display_name"),
    })
}

pub async fn find_by_phone(
    conn: &mut SqliteConnection,
    org_id: &str,
    phone_e164: &str,
) -> Result<Option<ContactRecord>> {
    let row = sqlx::query(
        "SELECT id, org_id, phone_e164, display_name FROM contacts WHERE org_id = ? AND phone_e164 = ?",
    )
    .bind(org_id)
    .bind(phone_e164)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<ContactRecord>> {
    let row = sqlx::query("SELECT id, org_id, phone_e164, display_name FROM contacts WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Insert a placeholder contact unless one exists for (org, phone)
///
/// Returns `true` if this call created the row.
pub async fn insert_if_absent(
    conn: &mut SqliteConnection,
    id: Uuid,
    org_id: &str,
    phone_e164: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO contacts (id, org_id, phone_e164, display_name)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (org_id, phone_e164) DO NOTHING
        "#,
    )
    .bind(id.to_string())
    .bind(org_id)
    .bind(phone_e164)
    .bind(PLACEHOLDER_DISPLAY_NAME)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn update_display_name(
    conn: &mut SqliteConnection,
    id: Uuid,
    display_name: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE contacts SET display_name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(display_name)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
