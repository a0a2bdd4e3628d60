// crates/changedesk-core/src/status.rs
// ============================================================================
// Module: Changedesk Status Machine
// Description: Lifecycle statuses and the permitted-transition table.
// Purpose: Validate transitions and stamp attribution on success.
// Dependencies: crate::{identifiers, object, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! Records move through {draft, submitted, approved, completed, cancelled}.
//! [`is_permitted`] is the exact transition table; every other pair fails
//! with [`TransitionError::InvalidTransition`]. [`apply_transition`] performs
//! the stamping contract: `prior_status`, `modified_by/at`, the matching
//! attribution triple, and one audit entry typed by the new status.
//! Completed and cancelled are terminal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::UserEmail;
use crate::object::ModificationEntry;
use crate::object::ModificationType;
use crate::object::ObjectRecord;
use crate::time::UtcTimestamp;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle status of an object record.
///
/// # Invariants
/// - Variants are stable for serialization and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    /// Work in progress under `drafts/`.
    Draft,
    /// Submitted for approval; first archive write.
    Submitted,
    /// Approved; side effects dispatched.
    Approved,
    /// Terminal: implementation finished.
    Completed,
    /// Terminal: withdrawn.
    Cancelled,
}

impl ObjectStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] =
        [Self::Draft, Self::Submitted, Self::Approved, Self::Completed, Self::Cancelled];

    /// Returns the lowercase wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Resolves a status from its lowercase wire label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == label)
    }

    /// Returns true when no further transition is permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Status transition errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The requested transition is not in the permitted table.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the record currently holds.
        from: ObjectStatus,
        /// Status that was requested.
        to: ObjectStatus,
    },
}

// ============================================================================
// SECTION: Transition Table
// ============================================================================

/// Returns true when the transition is permitted.
///
/// The table is exactly:
/// draft -> {submitted, cancelled}; submitted -> {approved, cancelled};
/// approved -> {completed, cancelled}; completed and cancelled are terminal.
#[must_use]
pub const fn is_permitted(from: ObjectStatus, to: ObjectStatus) -> bool {
    matches!(
        (from, to),
        (ObjectStatus::Draft, ObjectStatus::Submitted)
            | (ObjectStatus::Draft, ObjectStatus::Cancelled)
            | (ObjectStatus::Submitted, ObjectStatus::Approved)
            | (ObjectStatus::Submitted, ObjectStatus::Cancelled)
            | (ObjectStatus::Approved, ObjectStatus::Completed)
            | (ObjectStatus::Approved, ObjectStatus::Cancelled)
    )
}

// ============================================================================
// SECTION: Transition Application
// ============================================================================

/// Result of a successful transition, echoing the stamped statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Status the record held before the transition.
    pub prior_status: ObjectStatus,
    /// Status the record now holds.
    pub new_status: ObjectStatus,
}

/// Validates and applies a status transition in place.
///
/// On success the record carries: `prior_status` equal to the pre-transition
/// status, the new `status`, refreshed `modified_by/at`, the attribution
/// triple matching the new status, and an appended audit entry whose type is
/// the new status.
///
/// # Errors
///
/// Returns [`TransitionError::InvalidTransition`] when the table rejects the
/// requested pair; the record is left untouched.
pub fn apply_transition(
    record: &mut ObjectRecord,
    to: ObjectStatus,
    actor: &UserEmail,
    now: UtcTimestamp,
) -> Result<TransitionOutcome, TransitionError> {
    let from = record.status;
    if !is_permitted(from, to) {
        return Err(TransitionError::InvalidTransition {
            from,
            to,
        });
    }
    record.prior_status = Some(from);
    record.status = to;
    record.modified_by = Some(actor.clone());
    record.modified_at = Some(now);
    match to {
        ObjectStatus::Submitted => {
            record.submitted_by = Some(actor.clone());
            record.submitted_at = Some(now);
        }
        ObjectStatus::Approved => {
            record.approved_by = Some(actor.clone());
            record.approved_at = Some(now);
        }
        ObjectStatus::Completed => {
            record.completed_by = Some(actor.clone());
            record.completed_at = Some(now);
        }
        ObjectStatus::Cancelled => {
            record.cancelled_by = Some(actor.clone());
            record.cancelled_at = Some(now);
        }
        ObjectStatus::Draft => {}
    }
    record.append_modification(ModificationEntry {
        timestamp: now,
        user_id: actor.clone(),
        modification_type: ModificationType::for_status(to),
        meeting_metadata: None,
    });
    Ok(TransitionOutcome {
        prior_status: from,
        new_status: to,
    })
}
