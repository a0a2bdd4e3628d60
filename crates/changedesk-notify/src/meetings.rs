// crates/changedesk-notify/src/meetings.rs
// ============================================================================
// Module: Meeting Scheduler
// Description: Type-dispatched creation and cancellation of video meetings.
// Purpose: Schedule events for approved records and tear them down on cancel.
// Dependencies: changedesk-core, reqwest
// ============================================================================

//! ## Overview
//! The scheduler composes a meeting from the record (subject
//! `"<SUBTYPE> Event: <title>"`, window from the implementation dates) and
//! calls the external video-conference capability through [`MeetingClient`].
//! Scheduling failures are non-fatal to the caller's transition: the reactor
//! logs them and keeps sending mail without a join URL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::Duration;

use changedesk_core::MeetingMetadata;
use changedesk_core::ObjectRecord;
use changedesk_core::ObjectType;
use changedesk_core::UtcTimestamp;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Timeout applied to every meeting-service call.
const MEETING_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default meeting length when no implementation window is present.
const DEFAULT_MEETING_MINUTES: i64 = 30;
/// Default lead time before a meeting when no window is present.
const DEFAULT_LEAD_HOURS: i64 = 24;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Meeting service errors.
#[derive(Debug, Error)]
pub enum MeetingError {
    /// Client configuration is invalid.
    #[error("meeting invalid: {0}")]
    Invalid(String),
    /// The meeting service rejected or failed the call.
    #[error("meeting service error: {0}")]
    Service(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// One meeting to schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingRequest {
    /// Meeting subject.
    pub subject: String,
    /// Meeting body text.
    pub body: String,
    /// Start instant.
    pub start_time: UtcTimestamp,
    /// End instant.
    pub end_time: UtcTimestamp,
    /// Organizer address.
    pub organizer: String,
    /// Attendee addresses or list names.
    pub attendees: Vec<String>,
}

/// Composes the meeting subject for a record.
///
/// Changes render as `Change Event: <title>`, announcements as
/// `<SUBTYPE> Event: <title>`.
#[must_use]
pub fn meeting_subject(record: &ObjectRecord) -> String {
    match record.object_type {
        ObjectType::Change => format!("Change Event: {}", record.title),
        ObjectType::Announcement(subtype) => {
            format!("{} Event: {}", subtype.display_label(), record.title)
        }
    }
}

/// Derives the meeting window for a record.
///
/// The implementation window wins when present; otherwise the meeting is a
/// default-length slot one day out from `now`.
#[must_use]
pub fn meeting_window(record: &ObjectRecord, now: UtcTimestamp) -> (UtcTimestamp, UtcTimestamp) {
    if let (Some(start), Some(end)) = (record.implementation_start, record.implementation_end) {
        return (start, end);
    }
    let start = UtcTimestamp::from_datetime(now.inner() + time::Duration::hours(DEFAULT_LEAD_HOURS));
    let end = UtcTimestamp::from_datetime(
        start.inner() + time::Duration::minutes(DEFAULT_MEETING_MINUTES),
    );
    (start, end)
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// External video-conference capability.
pub trait MeetingClient: Send + Sync {
    /// Schedules a meeting and returns its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError`] when the service call fails.
    fn schedule(&self, request: &MeetingRequest) -> Result<MeetingMetadata, MeetingError>;

    /// Cancels a previously scheduled meeting.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError`] when the service call fails.
    fn cancel(&self, meeting_id: &str) -> Result<(), MeetingError>;
}

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

/// Response payload returned by the meeting service on create.
#[derive(Debug, Deserialize)]
struct CreateMeetingResponse {
    /// Meeting identifier.
    meeting_id: String,
    /// Join URL.
    join_url: String,
}

/// HTTP-backed meeting client.
pub struct HttpMeetingClient {
    /// Blocking HTTP client with timeouts applied.
    client: reqwest::blocking::Client,
    /// Service base URL.
    base_url: String,
    /// Bearer token for the meeting service.
    token: String,
}

impl HttpMeetingClient {
    /// Creates a new HTTP meeting client.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError::Invalid`] when the base URL is unset or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, token: &str) -> Result<Self, MeetingError> {
        if base_url.trim().is_empty() {
            return Err(MeetingError::Invalid("base url must be set".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(MEETING_CALL_TIMEOUT)
            .build()
            .map_err(|err| MeetingError::Invalid(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

impl MeetingClient for HttpMeetingClient {
    fn schedule(&self, request: &MeetingRequest) -> Result<MeetingMetadata, MeetingError> {
        let response = self
            .client
            .post(format!("{}/meetings", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .map_err(|err| MeetingError::Service(err.to_string()))?;
        if !response.status().is_success() {
            return Err(MeetingError::Service(format!(
                "create returned status {}",
                response.status()
            )));
        }
        let created: CreateMeetingResponse =
            response.json().map_err(|err| MeetingError::Service(err.to_string()))?;
        Ok(MeetingMetadata {
            meeting_id: created.meeting_id,
            join_url: created.join_url,
            start_time: request.start_time,
            end_time: request.end_time,
            subject: request.subject.clone(),
            organizer: request.organizer.clone(),
        })
    }

    fn cancel(&self, meeting_id: &str) -> Result<(), MeetingError> {
        let response = self
            .client
            .delete(format!("{}/meetings/{meeting_id}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .map_err(|err| MeetingError::Service(err.to_string()))?;
        if !response.status().is_success() {
            return Err(MeetingError::Service(format!(
                "cancel returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Recording Client
// ============================================================================

/// Meeting client that records calls for tests and dry-run deployments.
#[derive(Default)]
pub struct RecordingMeetingClient {
    /// Scheduled requests.
    scheduled: Mutex<Vec<MeetingRequest>>,
    /// Cancelled meeting identifiers.
    cancelled: Mutex<Vec<String>>,
    /// When true, schedule calls fail.
    fail_schedule: Mutex<bool>,
}

impl RecordingMeetingClient {
    /// Creates an empty recording client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent schedule calls fail.
    pub fn fail_next_schedules(&self) {
        if let Ok(mut flag) = self.fail_schedule.lock() {
            *flag = true;
        }
    }

    /// Returns the recorded schedule requests.
    #[must_use]
    pub fn scheduled(&self) -> Vec<MeetingRequest> {
        self.scheduled.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Returns the recorded cancellations.
    #[must_use]
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl MeetingClient for RecordingMeetingClient {
    fn schedule(&self, request: &MeetingRequest) -> Result<MeetingMetadata, MeetingError> {
        if self.fail_schedule.lock().map(|flag| *flag).unwrap_or(false) {
            return Err(MeetingError::Service("meeting service unavailable".to_string()));
        }
        let mut scheduled = self
            .scheduled
            .lock()
            .map_err(|_| MeetingError::Service("recording lock poisoned".to_string()))?;
        scheduled.push(request.clone());
        let meeting_id = format!("meet-{}", scheduled.len());
        Ok(MeetingMetadata {
            meeting_id: meeting_id.clone(),
            join_url: format!("https://meet.example.com/{meeting_id}"),
            start_time: request.start_time,
            end_time: request.end_time,
            subject: request.subject.clone(),
            organizer: request.organizer.clone(),
        })
    }

    fn cancel(&self, meeting_id: &str) -> Result<(), MeetingError> {
        self.cancelled
            .lock()
            .map_err(|_| MeetingError::Service("recording lock poisoned".to_string()))?
            .push(meeting_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests;
