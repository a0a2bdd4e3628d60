// crates/changedesk-core/src/object.rs
// ============================================================================
// Module: Changedesk Object Records
// Description: Polymorphic change/announcement records and their audit trail.
// Purpose: Provide the canonical stored shape shared by every component.
// Dependencies: crate::{identifiers, status, time}, serde
// ============================================================================

//! ## Overview
//! An [`ObjectRecord`] is the single stored shape for both changes and typed
//! announcements. The `object_type` tag selects the kind; kind-specific
//! fields are additive over the common core and survive every status change.
//! A record is never rewritten from one kind into another.
//!
//! The `modifications` trail is append-only. Concurrent writers merge trails
//! by concatenation with deduplication on
//! `(timestamp, user_id, modification_type)`, which keeps replayed retries
//! harmless.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::AnnouncementId;
use crate::identifiers::ChangeId;
use crate::identifiers::CustomerCode;
use crate::identifiers::UserEmail;
use crate::status::ObjectStatus;
use crate::time::UtcTimestamp;

// ============================================================================
// SECTION: Object Type Tags
// ============================================================================

/// Wire prefix selecting the announcement handler set.
const ANNOUNCEMENT_TYPE_PREFIX: &str = "announcement_";
/// Wire tag for change records.
const CHANGE_TYPE_TAG: &str = "change";

/// Coarse record kind derived from the `object_type` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Change record.
    Change,
    /// Announcement record of any subtype.
    Announcement,
}

/// Announcement subtype encoded after the `announcement_` prefix.
///
/// # Invariants
/// - Variants are stable for serialization and identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementSubtype {
    /// Cloud Infrastructure Community announcements.
    Cic,
    /// FinOps announcements.
    Finops,
    /// InnerSource announcements.
    Innersource,
    /// General announcements.
    General,
}

impl AnnouncementSubtype {
    /// All known subtypes, in identifier-prefix order.
    pub const ALL: [Self; 4] = [Self::Cic, Self::Finops, Self::Innersource, Self::General];

    /// Returns the lowercase wire label (`cic`, `finops`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cic => "cic",
            Self::Finops => "finops",
            Self::Innersource => "innersource",
            Self::General => "general",
        }
    }

    /// Returns the uppercase identifier prefix (`CIC`, `FIN`, ...).
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Cic => "CIC",
            Self::Finops => "FIN",
            Self::Innersource => "INN",
            Self::General => "GEN",
        }
    }

    /// Returns the display label used in meeting subjects and templates.
    #[must_use]
    pub const fn display_label(self) -> &'static str {
        match self {
            Self::Cic => "CIC",
            Self::Finops => "FinOps",
            Self::Innersource => "InnerSource",
            Self::General => "General",
        }
    }

    /// Resolves a subtype from its identifier prefix.
    #[must_use]
    pub fn from_id_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|subtype| subtype.id_prefix() == prefix)
    }

    /// Resolves a subtype from its lowercase wire label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|subtype| subtype.as_str() == label)
    }
}

/// Full `object_type` tag selecting the record kind.
///
/// # Invariants
/// - Serializes as `change` or `announcement_<subtype>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// Change record.
    Change,
    /// Announcement record with its subtype.
    Announcement(AnnouncementSubtype),
}

impl ObjectType {
    /// Returns the wire tag for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Change => CHANGE_TYPE_TAG,
            Self::Announcement(AnnouncementSubtype::Cic) => "announcement_cic",
            Self::Announcement(AnnouncementSubtype::Finops) => "announcement_finops",
            Self::Announcement(AnnouncementSubtype::Innersource) => "announcement_innersource",
            Self::Announcement(AnnouncementSubtype::General) => "announcement_general",
        }
    }

    /// Parses a wire tag into a type.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        if tag == CHANGE_TYPE_TAG {
            return Some(Self::Change);
        }
        let label = tag.strip_prefix(ANNOUNCEMENT_TYPE_PREFIX)?;
        AnnouncementSubtype::from_label(label).map(Self::Announcement)
    }

    /// Returns the coarse kind for handler routing.
    #[must_use]
    pub const fn kind(self) -> ObjectKind {
        match self {
            Self::Change => ObjectKind::Change,
            Self::Announcement(_) => ObjectKind::Announcement,
        }
    }

    /// Returns the announcement subtype when this is an announcement tag.
    #[must_use]
    pub const fn subtype(self) -> Option<AnnouncementSubtype> {
        match self {
            Self::Change => None,
            Self::Announcement(subtype) => Some(subtype),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ObjectType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ObjectType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown object_type: {raw}")))
    }
}

// ============================================================================
// SECTION: Modification Trail
// ============================================================================

/// Kind of change recorded in a modification entry.
///
/// # Invariants
/// - Variants are stable for serialization and dedup keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationType {
    /// Record created as a draft.
    Created,
    /// Record content edited.
    Updated,
    /// Record submitted for approval.
    Submitted,
    /// Record approved.
    Approved,
    /// Record completed.
    Completed,
    /// Record cancelled.
    Cancelled,
    /// Meeting scheduled by the reactor.
    MeetingScheduled,
    /// Survey provisioned on completion.
    SurveyCreated,
}

impl ModificationType {
    /// Returns the modification type matching a status transition target.
    #[must_use]
    pub const fn for_status(status: ObjectStatus) -> Self {
        match status {
            ObjectStatus::Draft => Self::Created,
            ObjectStatus::Submitted => Self::Submitted,
            ObjectStatus::Approved => Self::Approved,
            ObjectStatus::Completed => Self::Completed,
            ObjectStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// One append-only audit entry on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationEntry {
    /// Instant the modification was applied.
    pub timestamp: UtcTimestamp,
    /// User who applied the modification.
    pub user_id: UserEmail,
    /// Kind of modification.
    pub modification_type: ModificationType,
    /// Meeting details when the writer is the meeting scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_metadata: Option<MeetingMetadata>,
}

// ============================================================================
// SECTION: Side-Effect Metadata
// ============================================================================

/// Video-conference meeting details stamped back onto a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingMetadata {
    /// External meeting identifier.
    pub meeting_id: String,
    /// Join URL handed to attendees.
    pub join_url: String,
    /// Scheduled start instant.
    pub start_time: UtcTimestamp,
    /// Scheduled end instant.
    pub end_time: UtcTimestamp,
    /// Meeting subject line.
    pub subject: String,
    /// Organizer address.
    pub organizer: String,
}

/// Uploaded attachment metadata carried on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name.
    pub name: String,
    /// Object-store key holding the bytes.
    pub store_key: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload instant.
    pub uploaded_at: UtcTimestamp,
}

// ============================================================================
// SECTION: Object Record
// ============================================================================

/// Canonical stored record for a change or announcement.
///
/// # Invariants
/// - Exactly one of `change_id` / `announcement_id` is set, matching
///   `object_type`.
/// - `version` strictly increases across writes; the stored value is the
///   read version plus one.
/// - `modifications` is append-only and ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Kind tag (`change` or `announcement_<subtype>`).
    pub object_type: ObjectType,
    /// Change identifier (change records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_id: Option<ChangeId>,
    /// Announcement identifier (announcement records only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement_id: Option<AnnouncementId>,
    /// Human title.
    pub title: String,
    /// Change description (change records).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Announcement summary paragraph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Announcement body content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Ordered recipient customer codes.
    pub customers: Vec<CustomerCode>,
    /// Current lifecycle status.
    pub status: ObjectStatus,
    /// Status held immediately before the current write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_status: Option<ObjectStatus>,
    /// Monotonically increasing version counter.
    pub version: u64,
    /// Whether the reactor should schedule a meeting on approval.
    #[serde(default)]
    pub include_meeting: bool,
    /// Implementation window start (change records).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_start: Option<UtcTimestamp>,
    /// Implementation window end (change records).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_end: Option<UtcTimestamp>,
    /// Creator address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserEmail>,
    /// Creation instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<UtcTimestamp>,
    /// Last modifier address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<UserEmail>,
    /// Last modification instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<UtcTimestamp>,
    /// Submitter address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<UserEmail>,
    /// Submission instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<UtcTimestamp>,
    /// Approver address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<UserEmail>,
    /// Approval instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<UtcTimestamp>,
    /// Completer address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<UserEmail>,
    /// Completion instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<UtcTimestamp>,
    /// Canceller address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<UserEmail>,
    /// Cancellation instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<UtcTimestamp>,
    /// Append-only audit trail.
    #[serde(default)]
    pub modifications: Vec<ModificationEntry>,
    /// Meeting details once scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_metadata: Option<MeetingMetadata>,
    /// Uploaded attachment metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Survey form identifier stamped on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,
    /// Survey URL stamped on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_url: Option<String>,
    /// Survey creation instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_created_at: Option<UtcTimestamp>,
}

impl ObjectRecord {
    /// Builds a fresh change draft.
    #[must_use]
    pub fn new_change(
        change_id: ChangeId,
        title: impl Into<String>,
        customers: Vec<CustomerCode>,
        created_by: UserEmail,
        now: UtcTimestamp,
    ) -> Self {
        let mut record = Self::empty(ObjectType::Change, title, customers, created_by, now);
        record.change_id = Some(change_id);
        record
    }

    /// Builds a fresh announcement draft.
    #[must_use]
    pub fn new_announcement(
        subtype: AnnouncementSubtype,
        announcement_id: AnnouncementId,
        title: impl Into<String>,
        customers: Vec<CustomerCode>,
        created_by: UserEmail,
        now: UtcTimestamp,
    ) -> Self {
        let mut record =
            Self::empty(ObjectType::Announcement(subtype), title, customers, created_by, now);
        record.announcement_id = Some(announcement_id);
        record
    }

    /// Shared construction core for new drafts.
    fn empty(
        object_type: ObjectType,
        title: impl Into<String>,
        customers: Vec<CustomerCode>,
        created_by: UserEmail,
        now: UtcTimestamp,
    ) -> Self {
        Self {
            object_type,
            change_id: None,
            announcement_id: None,
            title: title.into(),
            description: None,
            summary: None,
            content: None,
            customers,
            status: ObjectStatus::Draft,
            prior_status: None,
            version: 0,
            include_meeting: false,
            implementation_start: None,
            implementation_end: None,
            created_by: Some(created_by.clone()),
            created_at: Some(now),
            modified_by: Some(created_by.clone()),
            modified_at: Some(now),
            submitted_by: None,
            submitted_at: None,
            approved_by: None,
            approved_at: None,
            completed_by: None,
            completed_at: None,
            cancelled_by: None,
            cancelled_at: None,
            modifications: vec![ModificationEntry {
                timestamp: now,
                user_id: created_by,
                modification_type: ModificationType::Created,
                meeting_metadata: None,
            }],
            meeting_metadata: None,
            attachments: Vec::new(),
            survey_id: None,
            survey_url: None,
            survey_created_at: None,
        }
    }

    /// Returns the record identifier as a key-safe string.
    #[must_use]
    pub fn id_str(&self) -> &str {
        match (&self.change_id, &self.announcement_id) {
            (Some(id), _) => id.as_str(),
            (None, Some(id)) => id.as_str(),
            (None, None) => "",
        }
    }

    /// Appends an audit entry, skipping exact duplicates.
    pub fn append_modification(&mut self, entry: ModificationEntry) {
        let duplicate = self.modifications.iter().any(|existing| {
            existing.timestamp == entry.timestamp
                && existing.user_id == entry.user_id
                && existing.modification_type == entry.modification_type
        });
        if !duplicate {
            self.modifications.push(entry);
        }
    }

    /// Merges another trail into this record by concatenation with dedup.
    ///
    /// Entries already present (same timestamp, user, and type) are skipped;
    /// the merged trail is re-sorted by timestamp to preserve ordering.
    pub fn merge_modifications(&mut self, other: &[ModificationEntry]) {
        for entry in other {
            self.append_modification(entry.clone());
        }
        self.modifications.sort_by_key(|entry| entry.timestamp);
    }

    /// Builds a draft copy with a fresh identity.
    ///
    /// Status, version, attribution beyond the creator, and side-effect
    /// metadata are all reset; content fields are carried over.
    #[must_use]
    pub fn duplicate_as_draft(
        &self,
        change_id: Option<ChangeId>,
        announcement_id: Option<AnnouncementId>,
        created_by: UserEmail,
        now: UtcTimestamp,
    ) -> Self {
        let mut copy = self.clone();
        copy.change_id = change_id;
        copy.announcement_id = announcement_id;
        copy.status = ObjectStatus::Draft;
        copy.prior_status = None;
        copy.version = 0;
        copy.created_by = Some(created_by.clone());
        copy.created_at = Some(now);
        copy.modified_by = Some(created_by.clone());
        copy.modified_at = Some(now);
        copy.submitted_by = None;
        copy.submitted_at = None;
        copy.approved_by = None;
        copy.approved_at = None;
        copy.completed_by = None;
        copy.completed_at = None;
        copy.cancelled_by = None;
        copy.cancelled_at = None;
        copy.meeting_metadata = None;
        copy.survey_id = None;
        copy.survey_url = None;
        copy.survey_created_at = None;
        copy.modifications = vec![ModificationEntry {
            timestamp: now,
            user_id: created_by,
            modification_type: ModificationType::Created,
            meeting_metadata: None,
        }];
        copy
    }
}
