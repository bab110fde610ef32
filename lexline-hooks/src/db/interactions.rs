//! Interaction (call attempt) persistence

use chrono::{DateTime, Utc};
use lexline_common::Result;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{parse_optional_timestamp, parse_timestamp, parse_uuid};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    id: Uuid,
    lead_id: Uuid,
    started_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO interactions (id, lead_id, status, started_at) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(lead_id.to_string())
        .bind(STATUS_ACTIVE)
        .bind(started_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Mark an interaction completed; the first recorded end time is kept
pub async fn complete(conn: &mut SqliteConnection, id: Uuid, ended_at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE interactions
        SET status = ?, ended_at = COALESCE(ended_at, ?)
        WHERE id = ?
        "#,
    )
    .bind(STATUS_COMPLETED)
    .bind(ended_at.to_rfc3339())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<InteractionRecord>> {
    let row = sqlx::query(
        "SELECT id, lead_id, status, started_at, ended_at FROM interactions WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let lead_id: String = row.get("lead_id");
            let started_at: String = row.get("started_at");
            Ok(Some(InteractionRecord {
                id: parse_uuid(&id)?,
                lead_id: parse_uuid(&lead_id)?,
                status: row.get("status"),
                started_at: parse_timestamp(&started_at)?,
                ended_at: parse_optional_timestamp(row.get("ended_at"))?,
            }))
        }
        None => Ok(None),
    }
}
