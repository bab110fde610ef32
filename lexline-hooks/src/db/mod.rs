//! Database access layer for lexline-hooks
//!
//! Every function takes the connection explicitly (`&mut SqliteConnection`)
//! so callers decide the transaction scope: a pool connection for reads, the
//! event transaction for writes.

use chrono::{DateTime, Utc};
use lexline_common::{Error, Result};
use uuid::Uuid;

pub mod calls;
pub mod contacts;
pub mod interactions;
pub mod leads;
pub mod ledger;
pub mod tenants;

/// Parse a TEXT uuid column
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid uuid {:?}: {}", value, e)))
}

/// Parse an RFC 3339 TEXT timestamp column
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp {:?}: {}", value, e)))
}

pub(crate) fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}
