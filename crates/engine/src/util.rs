//! Internal helpers for input normalization.
//!
//! These utilities are **not** part of the public API. They centralize
//! trimming rules so every entry point stores the same canonical values.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Trim an account id, rejecting blank ones.
pub(crate) fn normalize_account_id(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAccount(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Currency codes are free text, stored upper-cased.
pub(crate) fn normalize_currency(value: Option<&str>) -> Option<String> {
    normalize_optional_text(value).map(|code| code.to_ascii_uppercase())
}

/// Parse an id read back from the database.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id: {value}")))
}
