//! Lead (case opportunity) persistence

use lexline_common::Result;
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use uuid::Uuid;

use super::parse_uuid;
use crate::models::ExtractionResult;
use crate::services::qualification_scorer::{Qualification, TranscriptSignals};

/// Statuses in which a lead is reused by repeat calls
pub const OPEN_STATUSES: [&str; 3] = ["new", "contacted", "in_progress"];

pub const STATUS_NEW: &str = "new";
pub const SOURCE_PHONE: &str = "phone";
pub const PRIORITY_MEDIUM: &str = "medium";

#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub id: Uuid,
    pub org_id: String,
    pub contact_id: Uuid,
    pub status: String,
    pub source: String,
    pub priority: String,
    pub extracted_data: Map<String, Value>,
    pub intake: Option<ExtractionResult>,
    pub qualification_score: Option<i64>,
    pub qualification_label: Option<String>,
    pub qualification_reasons: Vec<String>,
    /// Transcript signals accumulated over every scored call
    pub qualification_signals: TranscriptSignals,
}

const LEAD_COLUMNS: &str = "id, org_id, contact_id, status, source, priority, extracted_data, \
     intake, qualification_score, qualification_label, qualification_reasons, qualification_signals";

fn from_row(row: &SqliteRow) -> Result<LeadRecord> {
    let id: String = row.get("id");
    let contact_id: String = row.get("contact_id");
    let extracted_data: String = row.get("extracted_data");
    let intake: Option<String> = row.get("intake");
    let reasons: Option<String> = row.get("qualification_reasons");
    let signals: Option<String> = row.get("qualification_signals");

    let extracted_data = match serde_json::from_str::<Value>(&extracted_data)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    // A stored intake that no longer parses is treated as absent rather than
    // failing every later read of the lead
    let intake = intake.and_then(|json| match serde_json::from_str(&json) {
        Ok(intake) => Some(intake),
        Err(e) => {
            tracing::warn!(lead_id = %id, error = %e, "Ignoring unreadable stored intake");
            None
        }
    });

    let qualification_reasons = reasons
        .and_then(|json| serde_json::from_str::<Vec<String>>(&json).ok())
        .unwrap_or_default();

    let qualification_signals = signals
        .and_then(|json| serde_json::from_str::<TranscriptSignals>(&json).ok())
        .unwrap_or_default();

    Ok(LeadRecord {
        id: parse_uuid(&id)?,
        org_id: row.get("org_id"),
        contact_id: parse_uuid(&contact_id)?,
        status: row.get("status"),
        source: row.get("source"),
        priority: row.get("priority"),
        extracted_data,
        intake,
        qualification_score: row.get("qualification_score"),
        qualification_label: row.get("qualification_label"),
        qualification_reasons,
        qualification_signals,
    })
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<LeadRecord>> {
    let sql = format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Most recent open lead for a contact
pub async fn find_open_for_contact(
    conn: &mut SqliteConnection,
    contact_id: Uuid,
) -> Result<Option<LeadRecord>> {
    let sql = format!(
        "SELECT {} FROM leads WHERE contact_id = ? AND status IN (?, ?, ?) \
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
        LEAD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(contact_id.to_string())
        .bind(OPEN_STATUSES[0])
        .bind(OPEN_STATUSES[1])
        .bind(OPEN_STATUSES[2])
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Insert a new phone-sourced lead (status new, priority medium)
pub async fn insert_phone_lead(
    conn: &mut SqliteConnection,
    id: Uuid,
    org_id: &str,
    contact_id: Uuid,
) -> Result<LeadRecord> {
    sqlx::query(
        r#"
        INSERT INTO leads (id, org_id, contact_id, status, source, priority, extracted_data)
        VALUES (?, ?, ?, ?, ?, ?, '{}')
        "#,
    )
    .bind(id.to_string())
    .bind(org_id)
    .bind(contact_id.to_string())
    .bind(STATUS_NEW)
    .bind(SOURCE_PHONE)
    .bind(PRIORITY_MEDIUM)
    .execute(&mut *conn)
    .await?;

    Ok(LeadRecord {
        id,
        org_id: org_id.to_string(),
        contact_id,
        status: STATUS_NEW.to_string(),
        source: SOURCE_PHONE.to_string(),
        priority: PRIORITY_MEDIUM.to_string(),
        extracted_data: Map::new(),
        intake: None,
        qualification_score: None,
        qualification_label: None,
        qualification_reasons: Vec::new(),
        qualification_signals: TranscriptSignals::default(),
    })
}

#[cfg(test)]
pub(crate) async fn update_status(conn: &mut SqliteConnection, id: Uuid, status: &str) -> Result<()> {
    sqlx::query("UPDATE leads SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(status)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn update_extracted_data(
    conn: &mut SqliteConnection,
    id: Uuid,
    extracted_data: &Map<String, Value>,
) -> Result<()> {
    let json = serde_json::to_string(extracted_data)?;

    sqlx::query("UPDATE leads SET extracted_data = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(json)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Store the merged intake and its qualification
pub async fn update_intake(
    conn: &mut SqliteConnection,
    id: Uuid,
    intake: &ExtractionResult,
    qualification: &Qualification,
) -> Result<()> {
    let intake_json = serde_json::to_string(intake)?;
    let reasons_json = serde_json::to_string(&qualification.reasons)?;
    let signals_json = serde_json::to_string(&qualification.signals)?;

    sqlx::query(
        r#"
        UPDATE leads
        SET intake = ?,
            qualification_score = ?,
            qualification_label = ?,
            qualification_reasons = ?,
            qualification_signals = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(intake_json)
    .bind(qualification.value as i64)
    .bind(qualification.label.as_str())
    .bind(reasons_json)
    .bind(signals_json)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) async fn count_for_contact(conn: &mut SqliteConnection, contact_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE contact_id = ?")
        .bind(contact_id.to_string())
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}
