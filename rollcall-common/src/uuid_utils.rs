//! Identifier helpers
//!
//! Every persisted entity is keyed by a UUIDv4 stored as TEXT.

use uuid::Uuid;

use crate::{Error, Result};

/// Generate a new entity identifier
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse an identifier read back from storage
///
/// A malformed id in the database is corruption, not user input.
pub fn parse_stored(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt stored id '{}': {}", s, e)))
}

/// Parse an optional identifier column
pub fn parse_stored_opt(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse_stored).transpose()
}
