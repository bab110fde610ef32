//! Call persistence
//!
//! A Call is created once at call-start and afterwards only looked up and
//! patched. The lookups here are the primitives of the correlation cascade.

use chrono::{DateTime, Utc};
use lexline_common::Result;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{parse_optional_timestamp, parse_timestamp, parse_uuid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub id: Uuid,
    pub org_id: String,
    pub lead_id: Uuid,
    pub interaction_id: Uuid,
    pub phone_number_id: Option<String>,
    pub elevenlabs_id: Option<String>,
    pub twilio_call_sid: Option<String>,
    pub caller_number: String,
    pub called_number: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub call_outcome: Option<String>,
    pub transcript_text: Option<String>,
    pub recording_url: Option<String>,
    pub ai_summary: Option<String>,
}

/// Values for a freshly created Call
#[derive(Debug, Clone)]
pub struct NewCall<'a> {
    pub id: Uuid,
    pub org_id: &'a str,
    pub lead_id: Uuid,
    pub interaction_id: Uuid,
    pub phone_number_id: Option<&'a str>,
    pub elevenlabs_id: Option<&'a str>,
    pub twilio_call_sid: Option<&'a str>,
    pub caller_number: &'a str,
    pub called_number: &'a str,
    pub started_at: DateTime<Utc>,
}

/// Column value for a dynamic patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Integer(i64),
    Text(String),
}

const CALL_COLUMNS: &str = "id, org_id, lead_id, interaction_id, phone_number_id, elevenlabs_id, \
     twilio_call_sid, caller_number, called_number, started_at, ended_at, duration_seconds, \
     call_outcome, transcript_text, recording_url, ai_summary";

fn from_row(row: &SqliteRow) -> Result<CallRecord> {
    let id: String = row.get("id");
    let lead_id: String = row.get("lead_id");
    let interaction_id: String = row.get("interaction_id");
    let started_at: String = row.get("started_at");

    Ok(CallRecord {
        id: parse_uuid(&id)?,
        org_id: row.get("org_id"),
        lead_id: parse_uuid(&lead_id)?,
        interaction_id: parse_uuid(&interaction_id)?,
        phone_number_id: row.get("phone_number_id"),
        elevenlabs_id: row.get("elevenlabs_id"),
        twilio_call_sid: row.get("twilio_call_sid"),
        caller_number: row.get("caller_number"),
        called_number: row.get("called_number"),
        started_at: parse_timestamp(&started_at)?,
        ended_at: parse_optional_timestamp(row.get("ended_at"))?,
        duration_seconds: row.get("duration_seconds"),
        call_outcome: row.get("call_outcome"),
        transcript_text: row.get("transcript_text"),
        recording_url: row.get("recording_url"),
        ai_summary: row.get("ai_summary"),
    })
}

pub async fn insert(conn: &mut SqliteConnection, call: &NewCall<'_>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO calls (
            id, org_id, lead_id, interaction_id, phone_number_id,
            elevenlabs_id, twilio_call_sid, caller_number, called_number, started_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(call.id.to_string())
    .bind(call.org_id)
    .bind(call.lead_id.to_string())
    .bind(call.interaction_id.to_string())
    .bind(call.phone_number_id)
    .bind(call.elevenlabs_id)
    .bind(call.twilio_call_sid)
    .bind(call.caller_number)
    .bind(call.called_number)
    .bind(call.started_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn find_one(
    conn: &mut SqliteConnection,
    where_clause: &str,
    keys: &[&str],
) -> Result<Option<CallRecord>> {
    // Provider ids are not guaranteed unique; prefer the most recent call
    let sql = format!(
        "SELECT {} FROM calls WHERE {} ORDER BY created_at DESC, rowid DESC LIMIT 1",
        CALL_COLUMNS, where_clause
    );
    let mut query = sqlx::query(&sql);
    for key in keys {
        query = query.bind(*key);
    }
    let row = query.fetch_optional(&mut *conn).await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<CallRecord>> {
    let id = id.to_string();
    find_one(conn, "id = ?", &[&id]).await
}

pub async fn find_by_interaction_id(
    conn: &mut SqliteConnection,
    interaction_id: &str,
) -> Result<Option<CallRecord>> {
    find_one(conn, "interaction_id = ?", &[interaction_id]).await
}

/// Client-supplied call id: our own Call id or the telephony call id the
/// placing system recorded
pub async fn find_by_client_call_id(
    conn: &mut SqliteConnection,
    call_id: &str,
) -> Result<Option<CallRecord>> {
    find_one(conn, "id = ? OR twilio_call_sid = ?", &[call_id, call_id]).await
}

pub async fn find_by_elevenlabs_id(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> Result<Option<CallRecord>> {
    find_one(conn, "elevenlabs_id = ?", &[conversation_id]).await
}

pub async fn find_by_twilio_call_sid(
    conn: &mut SqliteConnection,
    call_sid: &str,
) -> Result<Option<CallRecord>> {
    find_one(conn, "twilio_call_sid = ?", &[call_sid]).await
}

/// Write a set of column values to one call
///
/// Column names come from the merge policy table, never from input.
pub async fn apply_patch(
    conn: &mut SqliteConnection,
    id: Uuid,
    patch: &[(&'static str, ColumnValue)],
) -> Result<()> {
    if patch.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE calls SET ");
    for (column, value) in patch {
        builder.push(*column).push(" = ");
        match value {
            ColumnValue::Integer(v) => builder.push_bind(*v),
            ColumnValue::Text(v) => builder.push_bind(v.clone()),
        };
        builder.push(", ");
    }
    builder.push("updated_at = CURRENT_TIMESTAMP WHERE id = ");
    builder.push_bind(id.to_string());

    builder.build().execute(&mut *conn).await?;

    Ok(())
}
