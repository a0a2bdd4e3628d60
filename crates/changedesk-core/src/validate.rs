// crates/changedesk-core/src/validate.rs
// ============================================================================
// Module: Changedesk Record Validation
// Description: Structural validation for change and announcement records.
// Purpose: Fail closed on malformed payloads before they reach storage.
// Dependencies: crate::{identifiers, object}, thiserror
// ============================================================================

//! ## Overview
//! Validation is structural: identifier/kind agreement, required fields per
//! kind, non-empty recipient lists, and implementation-window ordering.
//! Customer-code existence against the configured directory is checked at the
//! facade, which owns that directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::object::ObjectKind;
use crate::object::ObjectRecord;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted title length.
const MAX_TITLE_LENGTH: usize = 512;
/// Maximum accepted body length for descriptions, summaries, and content.
const MAX_BODY_LENGTH: usize = 64 * 1024;
/// Maximum number of recipient customers on one record.
const MAX_CUSTOMERS: usize = 256;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Record validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// A field carries an invalid value.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Reason the value was rejected.
        reason: String,
    },
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a record's structure for its kind.
///
/// # Errors
///
/// Returns [`ValidationError`] on the first structural defect found.
pub fn validate_record(record: &ObjectRecord) -> Result<(), ValidationError> {
    if record.title.trim().is_empty() {
        return Err(ValidationError::MissingField("title"));
    }
    if record.title.len() > MAX_TITLE_LENGTH {
        return Err(ValidationError::InvalidField {
            field: "title",
            reason: format!("exceeds {MAX_TITLE_LENGTH} bytes"),
        });
    }
    if record.customers.is_empty() {
        return Err(ValidationError::MissingField("customers"));
    }
    if record.customers.len() > MAX_CUSTOMERS {
        return Err(ValidationError::InvalidField {
            field: "customers",
            reason: format!("exceeds {MAX_CUSTOMERS} entries"),
        });
    }
    for body in [&record.description, &record.summary, &record.content] {
        if let Some(value) = body
            && value.len() > MAX_BODY_LENGTH
        {
            return Err(ValidationError::InvalidField {
                field: "content",
                reason: format!("exceeds {MAX_BODY_LENGTH} bytes"),
            });
        }
    }
    match record.object_type.kind() {
        ObjectKind::Change => validate_change(record),
        ObjectKind::Announcement => validate_announcement(record),
    }
}

/// Change-specific structural checks.
fn validate_change(record: &ObjectRecord) -> Result<(), ValidationError> {
    if record.change_id.is_none() {
        return Err(ValidationError::MissingField("change_id"));
    }
    if record.announcement_id.is_some() {
        return Err(ValidationError::InvalidField {
            field: "announcement_id",
            reason: "not permitted on change records".to_string(),
        });
    }
    if record.description.as_deref().is_none_or(|value| value.trim().is_empty()) {
        return Err(ValidationError::MissingField("description"));
    }
    if let (Some(start), Some(end)) = (record.implementation_start, record.implementation_end)
        && end <= start
    {
        return Err(ValidationError::InvalidField {
            field: "implementation_end",
            reason: "must be after implementation_start".to_string(),
        });
    }
    Ok(())
}

/// Announcement-specific structural checks.
fn validate_announcement(record: &ObjectRecord) -> Result<(), ValidationError> {
    let Some(announcement_id) = &record.announcement_id else {
        return Err(ValidationError::MissingField("announcement_id"));
    };
    if record.change_id.is_some() {
        return Err(ValidationError::InvalidField {
            field: "change_id",
            reason: "not permitted on announcement records".to_string(),
        });
    }
    if record.summary.as_deref().is_none_or(|value| value.trim().is_empty()) {
        return Err(ValidationError::MissingField("summary"));
    }
    let id_subtype = announcement_id.subtype();
    if id_subtype != record.object_type.subtype() {
        return Err(ValidationError::InvalidField {
            field: "announcement_id",
            reason: "identifier prefix does not match object_type".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
