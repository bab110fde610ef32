//! # LexLine Common Library
//!
//! Shared code for the LexLine intake services including:
//! - Error type and result alias
//! - Phone number normalization and masking
//! - Webhook signature verification
//! - Configuration loading
//! - Database initialization

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod phone;

pub use error::{Error, Result};
pub use phone::{mask_phone, normalize_phone};
