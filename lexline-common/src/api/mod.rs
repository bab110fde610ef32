//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY pure functions and shared types. No HTTP
//! framework dependencies; the service wraps these with its own middleware.

pub mod signature;

pub use signature::{
    sign_payload, verify_signature, verify_signature_at, SignatureError, SignatureHeader,
    DEFAULT_TOLERANCE_SECS,
};
