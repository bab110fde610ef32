//! Database initialization
//!
//! Creates the SQLite database on first run and applies the schema
//! idempotently (`CREATE TABLE IF NOT EXISTS`) on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open (or create) the database file and apply the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL allows concurrent readers alongside the single writer
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    let mut conn = pool.acquire().await?;
    create_schema(&mut conn).await?;

    Ok(pool)
}

/// Open an in-memory database with the schema applied
///
/// Single connection: every SQLite `:memory:` connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = "sqlite::memory:"
        .parse::<SqliteConnectOptions>()?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    let mut conn = pool.acquire().await?;
    create_schema(&mut conn).await?;

    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(conn: &mut SqliteConnection) -> Result<()> {
    create_organizations_table(conn).await?;
    create_phone_numbers_table(conn).await?;
    create_contacts_table(conn).await?;
    create_leads_table(conn).await?;
    create_interactions_table(conn).await?;
    create_calls_table(conn).await?;
    create_webhook_events_table(conn).await?;
    create_webhook_event_links_table(conn).await?;

    Ok(())
}

async fn create_organizations_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn create_phone_numbers_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS phone_numbers (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            e164 TEXT NOT NULL UNIQUE,
            inbound_enabled INTEGER NOT NULL DEFAULT 1,
            label TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn create_contacts_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            phone_e164 TEXT NOT NULL,
            display_name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (org_id, phone_e164)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn create_leads_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            contact_id TEXT NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'new',
            source TEXT NOT NULL DEFAULT 'phone',
            priority TEXT NOT NULL DEFAULT 'medium',
            extracted_data TEXT NOT NULL DEFAULT '{}',
            intake TEXT,
            qualification_score INTEGER,
            qualification_label TEXT,
            qualification_reasons TEXT,
            qualification_signals TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_leads_contact_status ON leads(contact_id, status, created_at)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn create_interactions_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interactions (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'active',
            started_at TIMESTAMP NOT NULL,
            ended_at TIMESTAMP
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn create_calls_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calls (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            interaction_id TEXT NOT NULL REFERENCES interactions(id) ON DELETE CASCADE,
            phone_number_id TEXT REFERENCES phone_numbers(id) ON DELETE SET NULL,
            elevenlabs_id TEXT,
            twilio_call_sid TEXT,
            caller_number TEXT NOT NULL,
            called_number TEXT NOT NULL,
            started_at TIMESTAMP NOT NULL,
            ended_at TIMESTAMP,
            duration_seconds INTEGER,
            call_outcome TEXT,
            transcript_text TEXT,
            recording_url TEXT,
            ai_summary TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_interaction ON calls(interaction_id)")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_elevenlabs ON calls(elevenlabs_id)")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_twilio ON calls(twilio_call_sid)")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Append-only ledger; the unique index is the dedup serialization point
async fn create_webhook_events_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS webhook_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider TEXT NOT NULL,
            external_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            received_at TIMESTAMP NOT NULL,
            UNIQUE (provider, external_id, event_type)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_webhook_events_received ON webhook_events(received_at)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Resolution of a ledger entry to a Call; written once in the same
/// transaction as the ledger row, absent for unlinked events
async fn create_webhook_event_links_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS webhook_event_links (
            event_id INTEGER PRIMARY KEY REFERENCES webhook_events(id) ON DELETE CASCADE,
            call_id TEXT NOT NULL REFERENCES calls(id) ON DELETE CASCADE,
            correlation_method TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}
