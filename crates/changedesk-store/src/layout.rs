// crates/changedesk-store/src/layout.rs
// ============================================================================
// Module: Store Key Layout
// Description: Bucket prefix discipline and routing-hint metadata keys.
// Purpose: Derive every object key from validated segments in one place.
// Dependencies: crate::object_store, changedesk-core
// ============================================================================

//! ## Overview
//! All keys live in one bucket under fixed prefixes: `archive/` (canonical),
//! `customers/<code>/` (transient triggers), `drafts/`, `versions/<id>/`,
//! `deleted/<original-path>`, and `surveys/{forms,results}/...`. Key segments
//! are validated before use; traversal and separator characters fail closed.
//! Trigger objects additionally carry routing hints as user metadata
//! (`request-type`, `change-id`/`announcement-id`, `customer-code`,
//! `status`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use changedesk_core::CustomerCode;
use changedesk_core::ObjectKind;
use changedesk_core::ObjectRecord;
use changedesk_core::ObjectStatus;

use crate::object_store::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix for canonical archive records.
pub const ARCHIVE_PREFIX: &str = "archive/";
/// Prefix for per-customer transient trigger copies.
pub const CUSTOMERS_PREFIX: &str = "customers/";
/// Prefix for work-in-progress drafts.
pub const DRAFTS_PREFIX: &str = "drafts/";
/// Prefix for immutable version snapshots.
pub const VERSIONS_PREFIX: &str = "versions/";
/// Prefix for tombstoned originals.
pub const DELETED_PREFIX: &str = "deleted/";
/// Prefix for persisted survey form definitions.
pub const SURVEY_FORMS_PREFIX: &str = "surveys/forms/";
/// Prefix for persisted survey webhook results.
pub const SURVEY_RESULTS_PREFIX: &str = "surveys/results/";

/// Metadata key carrying the downstream routing hint.
pub const META_REQUEST_TYPE: &str = "request-type";
/// Metadata key carrying the change identifier.
pub const META_CHANGE_ID: &str = "change-id";
/// Metadata key carrying the announcement identifier.
pub const META_ANNOUNCEMENT_ID: &str = "announcement-id";
/// Metadata key carrying the trigger's customer code.
pub const META_CUSTOMER_CODE: &str = "customer-code";
/// Metadata key carrying the record status at write time.
pub const META_STATUS: &str = "status";

/// Maximum length of a single key segment.
const MAX_SEGMENT_LENGTH: usize = 255;

// ============================================================================
// SECTION: Routing Hints
// ============================================================================

/// Downstream routing hint written on trigger objects.
///
/// # Invariants
/// - Labels are stable wire values; one value per (kind, status) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// Change submitted, approval requested.
    ApprovalRequest,
    /// Announcement submitted, approval requested.
    AnnouncementApprovalRequest,
    /// Change approved.
    ApprovedChange,
    /// Announcement approved.
    ApprovedAnnouncement,
    /// Change cancelled.
    ChangeCancelled,
    /// Change completed.
    ChangeComplete,
    /// Announcement cancelled.
    AnnouncementCancelled,
    /// Announcement completed.
    AnnouncementCompleted,
    /// Announcement content updated in place.
    AnnouncementUpdate,
}

impl RequestType {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApprovalRequest => "approval_request",
            Self::AnnouncementApprovalRequest => "announcement_approval_request",
            Self::ApprovedChange => "approved_change",
            Self::ApprovedAnnouncement => "approved_announcement",
            Self::ChangeCancelled => "change_cancelled",
            Self::ChangeComplete => "change_complete",
            Self::AnnouncementCancelled => "announcement_cancelled",
            Self::AnnouncementCompleted => "announcement_completed",
            Self::AnnouncementUpdate => "announcement_update",
        }
    }

    /// Returns the routing hint for a (kind, status) trigger write.
    ///
    /// Draft writes never produce triggers, so draft maps to `None`.
    #[must_use]
    pub const fn for_transition(kind: ObjectKind, status: ObjectStatus) -> Option<Self> {
        match (kind, status) {
            (ObjectKind::Change, ObjectStatus::Submitted) => Some(Self::ApprovalRequest),
            (ObjectKind::Change, ObjectStatus::Approved) => Some(Self::ApprovedChange),
            (ObjectKind::Change, ObjectStatus::Cancelled) => Some(Self::ChangeCancelled),
            (ObjectKind::Change, ObjectStatus::Completed) => Some(Self::ChangeComplete),
            (ObjectKind::Announcement, ObjectStatus::Submitted) => {
                Some(Self::AnnouncementApprovalRequest)
            }
            (ObjectKind::Announcement, ObjectStatus::Approved) => Some(Self::ApprovedAnnouncement),
            (ObjectKind::Announcement, ObjectStatus::Cancelled) => {
                Some(Self::AnnouncementCancelled)
            }
            (ObjectKind::Announcement, ObjectStatus::Completed) => {
                Some(Self::AnnouncementCompleted)
            }
            (ObjectKind::Change | ObjectKind::Announcement, ObjectStatus::Draft) => None,
        }
    }

    /// Resolves a routing hint from its wire label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        const ALL: [RequestType; 9] = [
            RequestType::ApprovalRequest,
            RequestType::AnnouncementApprovalRequest,
            RequestType::ApprovedChange,
            RequestType::ApprovedAnnouncement,
            RequestType::ChangeCancelled,
            RequestType::ChangeComplete,
            RequestType::AnnouncementCancelled,
            RequestType::AnnouncementCompleted,
            RequestType::AnnouncementUpdate,
        ];
        ALL.into_iter().find(|value| value.as_str() == label)
    }
}

// ============================================================================
// SECTION: Key Builders
// ============================================================================

/// Returns the canonical archive key for an identifier.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the identifier is not key-safe.
pub fn archive_key(id: &str) -> Result<String, StoreError> {
    validate_segment(id)?;
    Ok(format!("{ARCHIVE_PREFIX}{id}.json"))
}

/// Returns the transient trigger key for a customer and identifier.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the identifier is not key-safe.
pub fn customer_key(customer: &CustomerCode, id: &str) -> Result<String, StoreError> {
    validate_segment(id)?;
    Ok(format!("{CUSTOMERS_PREFIX}{}/{id}.json", customer.as_str()))
}

/// Returns the draft key for an identifier.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the identifier is not key-safe.
pub fn draft_key(id: &str) -> Result<String, StoreError> {
    validate_segment(id)?;
    Ok(format!("{DRAFTS_PREFIX}{id}.json"))
}

/// Returns the snapshot key for an identifier at a version.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the identifier is not key-safe.
pub fn version_key(id: &str, version: u64) -> Result<String, StoreError> {
    validate_segment(id)?;
    Ok(format!("{VERSIONS_PREFIX}{id}/v{version}.json"))
}

/// Returns the version-snapshot listing prefix for an identifier.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the identifier is not key-safe.
pub fn versions_prefix(id: &str) -> Result<String, StoreError> {
    validate_segment(id)?;
    Ok(format!("{VERSIONS_PREFIX}{id}/"))
}

/// Returns the tombstone key mirroring an original path.
#[must_use]
pub fn deleted_key(original: &str) -> String {
    format!("{DELETED_PREFIX}{original}")
}

/// Returns the survey form snapshot key.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when a segment is not key-safe.
pub fn survey_form_key(
    customer: &CustomerCode,
    id: &str,
    timestamp_key: &str,
    form_id: &str,
) -> Result<String, StoreError> {
    validate_segment(id)?;
    validate_segment(timestamp_key)?;
    validate_segment(form_id)?;
    Ok(format!("{SURVEY_FORMS_PREFIX}{}/{id}/{timestamp_key}-{form_id}.json", customer.as_str()))
}

/// Returns the survey webhook result key.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when a segment is not key-safe.
pub fn survey_result_key(
    customer: &CustomerCode,
    year: i32,
    quarter: u8,
    timestamp_key: &str,
    form_id: &str,
) -> Result<String, StoreError> {
    validate_segment(timestamp_key)?;
    validate_segment(form_id)?;
    Ok(format!(
        "{SURVEY_RESULTS_PREFIX}{}/{year:04}/{quarter}/{timestamp_key}-{form_id}.json",
        customer.as_str()
    ))
}

/// Builds the routing-hint metadata for a record write.
///
/// Identifier and status hints are always present; `customer-code` and
/// `request-type` are added on trigger writes, where the hint follows the
/// one-value-per-kind table in [`RequestType::for_transition`].
#[must_use]
pub fn routing_metadata(
    record: &ObjectRecord,
    customer: Option<&CustomerCode>,
) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    if let Some(change_id) = &record.change_id {
        metadata.insert(META_CHANGE_ID.to_string(), change_id.to_string());
    }
    if let Some(announcement_id) = &record.announcement_id {
        metadata.insert(META_ANNOUNCEMENT_ID.to_string(), announcement_id.to_string());
    }
    metadata.insert(META_STATUS.to_string(), record.status.as_str().to_string());
    if let Some(customer) = customer {
        metadata.insert(META_CUSTOMER_CODE.to_string(), customer.to_string());
        if let Some(request_type) =
            RequestType::for_transition(record.object_type.kind(), record.status)
        {
            metadata.insert(META_REQUEST_TYPE.to_string(), request_type.as_str().to_string());
        }
    }
    metadata
}

/// Validates a single key segment.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for empty, oversized, traversal, or
/// separator-carrying segments.
pub fn validate_segment(value: &str) -> Result<(), StoreError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(StoreError::Invalid("segment is invalid".to_string()));
    }
    if value.len() > MAX_SEGMENT_LENGTH {
        return Err(StoreError::Invalid("segment exceeds length limit".to_string()));
    }
    if value.contains(['/', '\\']) || value.contains("..") {
        return Err(StoreError::Invalid("segment contains invalid characters".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
