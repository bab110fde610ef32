//! Error type shared by the LexLine crates
//!
//! HTTP mapping lives in the service; nothing here knows about status codes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON column or payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML file unreadable or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A row the caller expected (lead, contact, call) is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data violates an invariant (bad uuid, bad timestamp)
    #[error("Internal error: {0}")]
    Internal(String),
}
