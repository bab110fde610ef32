//! Idempotency ledger
//!
//! Every webhook delivery attempts one insert keyed by
//! `(provider, external_id, event_type)`. The unique index is the only
//! concurrency control in the pipeline: the first writer wins, and a later
//! writer observing the conflict treats the event as already processed.
//! Rows are never updated or deleted.

use chrono::{DateTime, Utc};
use lexline_common::Result;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

/// Ledger key plus raw payload
#[derive(Debug, Clone)]
pub struct NewWebhookEvent<'a> {
    pub provider: &'a str,
    pub external_id: &'a str,
    pub event_type: &'a str,
    pub payload: &'a str,
}

/// Result of recording an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordResult {
    pub is_new: bool,
    /// Row id of the inserted ledger entry (`None` for duplicates)
    pub event_id: Option<i64>,
}

/// Ledger row with its resolution, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: i64,
    pub provider: String,
    pub external_id: String,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
    pub call_id: Option<Uuid>,
    pub correlation_method: Option<String>,
}

/// Diagnostic view: ledger row joined with its resolved Call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerDiagnostic {
    pub entry: LedgerEntry,
    pub call: Option<LinkedCallSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedCallSummary {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub interaction_id: Uuid,
    pub elevenlabs_id: Option<String>,
    pub twilio_call_sid: Option<String>,
    pub caller_number: String,
    pub called_number: String,
    pub call_outcome: Option<String>,
    pub duration_seconds: Option<i64>,
}

/// Attempt to record an event
///
/// A uniqueness conflict is reported as `is_new = false`, not as an error.
pub async fn record_event(
    conn: &mut SqliteConnection,
    event: &NewWebhookEvent<'_>,
) -> Result<RecordResult> {
    let result = sqlx::query(
        r#"
        INSERT INTO webhook_events (provider, external_id, event_type, payload, received_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (provider, external_id, event_type) DO NOTHING
        "#,
    )
    .bind(event.provider)
    .bind(event.external_id)
    .bind(event.event_type)
    .bind(event.payload)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(RecordResult {
            is_new: false,
            event_id: None,
        });
    }

    Ok(RecordResult {
        is_new: true,
        event_id: Some(result.last_insert_rowid()),
    })
}

/// Record which Call a ledger entry resolved to
pub async fn link_event(
    conn: &mut SqliteConnection,
    event_id: i64,
    call_id: Uuid,
    correlation_method: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO webhook_event_links (event_id, call_id, correlation_method) VALUES (?, ?, ?)",
    )
    .bind(event_id)
    .bind(call_id.to_string())
    .bind(correlation_method)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

const ENTRY_SELECT: &str = r#"
    SELECT e.id, e.provider, e.external_id, e.event_type, e.received_at,
           l.call_id, l.correlation_method
    FROM webhook_events e
    LEFT JOIN webhook_event_links l ON l.event_id = e.id
"#;

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerEntry> {
    let received_at: String = row.get("received_at");
    let call_id: Option<String> = row.get("call_id");

    Ok(LedgerEntry {
        id: row.get("id"),
        provider: row.get("provider"),
        external_id: row.get("external_id"),
        event_type: row.get("event_type"),
        received_at: parse_timestamp(&received_at)?,
        call_id: call_id.as_deref().map(parse_uuid).transpose()?,
        correlation_method: row.get("correlation_method"),
    })
}

/// Look up the ledger entry for a key (used to answer duplicates)
pub async fn find_event(
    conn: &mut SqliteConnection,
    provider: &str,
    external_id: &str,
    event_type: &str,
) -> Result<Option<LedgerEntry>> {
    let sql = format!(
        "{} WHERE e.provider = ? AND e.external_id = ? AND e.event_type = ?",
        ENTRY_SELECT
    );
    let row = sqlx::query(&sql)
        .bind(provider)
        .bind(external_id)
        .bind(event_type)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(entry_from_row).transpose()
}

/// Most recent ledger entries, newest first, with their resolved Calls
pub async fn recent_with_calls(
    conn: &mut SqliteConnection,
    limit: u32,
) -> Result<Vec<LedgerDiagnostic>> {
    let rows = sqlx::query(
        r#"
        SELECT e.id, e.provider, e.external_id, e.event_type, e.received_at,
               l.call_id, l.correlation_method,
               c.lead_id, c.interaction_id, c.elevenlabs_id, c.twilio_call_sid,
               c.caller_number, c.called_number, c.call_outcome, c.duration_seconds
        FROM webhook_events e
        LEFT JOIN webhook_event_links l ON l.event_id = e.id
        LEFT JOIN calls c ON c.id = l.call_id
        ORDER BY e.id DESC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(&mut *conn)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let entry = entry_from_row(row)?;
        let lead_id: Option<String> = row.get("lead_id");

        // A link whose call row is gone yields no call summary
        let call = match (entry.call_id, lead_id) {
            (Some(call_id), Some(lead_id)) => {
                let interaction_id: String = row.get("interaction_id");
                Some(LinkedCallSummary {
                    id: call_id,
                    lead_id: parse_uuid(&lead_id)?,
                    interaction_id: parse_uuid(&interaction_id)?,
                    elevenlabs_id: row.get("elevenlabs_id"),
                    twilio_call_sid: row.get("twilio_call_sid"),
                    caller_number: row.get("caller_number"),
                    called_number: row.get("called_number"),
                    call_outcome: row.get("call_outcome"),
                    duration_seconds: row.get("duration_seconds"),
                })
            }
            _ => None,
        };

        entries.push(LedgerDiagnostic { entry, call });
    }

    Ok(entries)
}
