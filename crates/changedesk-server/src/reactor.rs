// crates/changedesk-server/src/reactor.rs
// ============================================================================
// Module: Lifecycle Reactor
// Description: Transition routing and type-dispatched side-effect orchestration.
// Purpose: Turn status transitions into triggers, meetings, mail, and surveys.
// Dependencies: changedesk-{core,notify,runner,store,survey}, tokio-util
// ============================================================================

//! ## Overview
//! The reactor owns the write path: every mutation goes through the
//! optimistic writer, and every successful transition fans out per-customer
//! reactions through the concurrency runner. The archive write always
//! happens before the customer trigger writes; trigger content mirrors the
//! archive at the instant of write. Handlers are idempotent under
//! re-delivery: meeting scheduling is guarded by `meeting_metadata`, survey
//! provisioning by `survey_id`, and modification entries merge by
//! concatenation with dedup. Side-effect failures are reported in the
//! response summary and never roll back the archive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use changedesk_core::CustomerCode;
use changedesk_core::ModificationEntry;
use changedesk_core::ModificationType;
use changedesk_core::ObjectRecord;
use changedesk_core::ObjectStatus;
use changedesk_core::TransitionError;
use changedesk_core::UserEmail;
use changedesk_core::UtcTimestamp;
use changedesk_core::apply_transition;
use changedesk_core::validate_record;
use changedesk_notify::EmailKind;
use changedesk_notify::EmailMessage;
use changedesk_notify::MailTransport;
use changedesk_notify::MeetingClient;
use changedesk_notify::MeetingRequest;
use changedesk_notify::contact_list_for;
use changedesk_notify::meeting_subject;
use changedesk_notify::meeting_window;
use changedesk_notify::render;
use changedesk_runner::CustomerJob;
use changedesk_runner::FanoutReport;
use changedesk_runner::FanoutSummary;
use changedesk_runner::FanoutTarget;
use changedesk_runner::run_fanout;
use changedesk_store::GatewayError;
use changedesk_store::ObjectGateway;
use changedesk_store::OptimisticWriter;
use changedesk_store::PutCondition;
use changedesk_store::RequestType;
use changedesk_store::StoreError;
use changedesk_store::WriteError;
use changedesk_store::archive_key;
use changedesk_store::customer_key;
use changedesk_store::draft_key;
use changedesk_store::layout::META_REQUEST_TYPE;
use changedesk_store::routing_metadata;
use changedesk_survey::SurveyProvisioner;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::audit::ReactorAuditSink;
use crate::audit::SideEffectAuditEvent;
use crate::audit::TransitionAuditEvent;
use crate::auth::AuthError;
use crate::queue::QueueNotification;
use crate::queue::QueuePublisher;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Public-surface error taxonomy.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad payload, missing field, unknown customer code, malformed date.
    #[error("validation error: {0}")]
    Validation(String),
    /// Missing identity or insufficient permission.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Object absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// State machine rejected the requested status.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    /// ETag mismatch exceeded retries.
    #[error("{0}")]
    ConcurrentModification(String),
    /// A record already exists under the identifier.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Wrapped failure from an upstream service.
    #[error("{service} error: {message}")]
    Upstream {
        /// Upstream service tag.
        service: &'static str,
        /// Failure detail.
        message: String,
    },
    /// Internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::NotFound {
                id,
            } => Self::NotFound(id),
            WriteError::AlreadyExists {
                id,
            } => Self::Conflict(format!("record already exists: {id}")),
            WriteError::Transition(inner) => Self::InvalidTransition(inner),
            WriteError::Rejected(message) => Self::Validation(message),
            conflict @ WriteError::ConcurrentModification {
                ..
            } => Self::ConcurrentModification(conflict.to_string()),
            WriteError::Gateway(inner) => inner.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Store(StoreError::NotFound {
                key, ..
            }) => Self::NotFound(key),
            other => Self::Internal(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Response body for a transition request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    /// Record identifier.
    pub object_id: String,
    /// Status after the transition.
    pub status: ObjectStatus,
    /// Version after the transition.
    pub version: u64,
    /// Per-customer reaction outcomes.
    pub update_results: Vec<changedesk_runner::CustomerOutcome>,
    /// Aggregated reaction counts.
    pub summary: FanoutSummary,
}

// ============================================================================
// SECTION: Reactor
// ============================================================================

/// Side-effect clients and policy the reactor dispatches through.
pub struct ReactorClients {
    /// Mail transport.
    pub mail: Arc<dyn MailTransport>,
    /// Meeting client.
    pub meetings: Arc<dyn MeetingClient>,
    /// Survey provisioner.
    pub surveys: Arc<SurveyProvisioner>,
    /// Queue publisher.
    pub queue: Arc<dyn QueuePublisher>,
    /// Audit sink.
    pub audit: Arc<dyn ReactorAuditSink>,
}

/// Lifecycle reactor: the single write path plus side-effect orchestration.
pub struct Reactor {
    /// Typed store gateway.
    gateway: ObjectGateway,
    /// Optimistic archive writer.
    writer: OptimisticWriter,
    /// Mail transport.
    mail: Arc<dyn MailTransport>,
    /// Meeting client.
    meetings: Arc<dyn MeetingClient>,
    /// Survey provisioner.
    surveys: Arc<SurveyProvisioner>,
    /// Queue publisher.
    queue: Arc<dyn QueuePublisher>,
    /// Audit sink.
    audit: Arc<dyn ReactorAuditSink>,
    /// Customer directory: code to friendly name.
    directory: BTreeMap<CustomerCode, String>,
    /// Approver contact list for submission mail.
    approver_list: String,
    /// Organizer stamped on scheduled meetings.
    organizer: String,
    /// Per-customer fan-out concurrency.
    max_concurrency: i64,
}

impl Reactor {
    /// Builds a reactor over a gateway, clients, and policy inputs.
    #[must_use]
    pub fn new(
        gateway: ObjectGateway,
        clients: ReactorClients,
        directory: BTreeMap<CustomerCode, String>,
        approver_list: String,
        organizer: String,
        max_concurrency: i64,
    ) -> Self {
        let writer = OptimisticWriter::new(gateway.clone());
        Self {
            gateway,
            writer,
            mail: clients.mail,
            meetings: clients.meetings,
            surveys: clients.surveys,
            queue: clients.queue,
            audit: clients.audit,
            directory,
            approver_list,
            organizer,
            max_concurrency,
        }
    }

    /// Returns the typed gateway (read paths in the facade).
    #[must_use]
    pub const fn gateway(&self) -> &ObjectGateway {
        &self.gateway
    }

    /// Returns the optimistic writer.
    #[must_use]
    pub const fn writer(&self) -> &OptimisticWriter {
        &self.writer
    }

    /// Returns the friendly name for a customer code.
    #[must_use]
    pub fn customer_name(&self, code: &CustomerCode) -> String {
        self.directory.get(code).cloned().unwrap_or_else(|| code.to_string())
    }

    /// Rejects customer codes outside the configured directory.
    ///
    /// An empty directory accepts every well-formed code.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first unknown code.
    pub fn ensure_known_customers(&self, customers: &[CustomerCode]) -> Result<(), ApiError> {
        if self.directory.is_empty() {
            return Ok(());
        }
        for code in customers {
            if !self.directory.contains_key(code) {
                return Err(ApiError::Validation(format!("unknown customer code: {code}")));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Creates the archive record for a new submission and reacts to it.
    ///
    /// The record must already carry the submitted transition; this method
    /// stamps version 1, performs the create-only archive write, removes any
    /// promoted draft, and runs the submitted reaction.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for validation failures, duplicate submissions,
    /// or store failures.
    pub async fn submit_new(
        &self,
        mut record: ObjectRecord,
        cancel: CancellationToken,
    ) -> Result<TransitionResponse, ApiError> {
        validate_record(&record).map_err(|err| ApiError::Validation(err.to_string()))?;
        self.ensure_known_customers(&record.customers)?;
        record.version = 1;
        self.writer.create(&record).map_err(ApiError::from)?;
        self.audit.record_transition(&TransitionAuditEvent::new(
            record.id_str(),
            record.object_type.as_str(),
            record.prior_status.map(ObjectStatus::as_str),
            record.status.as_str(),
            record.submitted_by.as_ref().map_or("", |user| user.as_str()),
            record.version,
        ));
        // The promoted draft, if any, is deleted only after the archive
        // create succeeds.
        let promoted_draft = draft_key(record.id_str()).map_err(GatewayError::Store)?;
        self.gateway.delete(&promoted_draft)?;
        Ok(self.react(record, cancel).await)
    }

    /// Applies a status transition and runs its reaction.
    ///
    /// Re-delivery (requested status equals the current status) skips the
    /// state machine and re-runs side effects behind their done markers.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for missing records, invalid transitions, or
    /// exhausted optimistic retries.
    pub async fn transition(
        &self,
        id: &str,
        to: ObjectStatus,
        actor: &UserEmail,
        cancel: CancellationToken,
    ) -> Result<TransitionResponse, ApiError> {
        let key = archive_key(id).map_err(GatewayError::Store)?;
        let (current, _etag) = self.gateway.get_json::<ObjectRecord>(&key)?;
        if current.status == to {
            return Ok(self.react(current, cancel).await);
        }
        let now = UtcTimestamp::now();
        let actor = actor.clone();
        let (updated, _etag) = self.writer.update(id, move |record| {
            // A retry may observe a concurrent writer that already applied
            // this transition; converging on the fresh state is a win, not a
            // conflict.
            if record.status == to {
                return Ok(());
            }
            apply_transition(record, to, &actor, now)?;
            Ok(())
        })?;
        self.audit.record_transition(&TransitionAuditEvent::new(
            updated.id_str(),
            updated.object_type.as_str(),
            updated.prior_status.map(ObjectStatus::as_str),
            updated.status.as_str(),
            updated.modified_by.as_ref().map_or("", |user| user.as_str()),
            updated.version,
        ));
        Ok(self.react(updated, cancel).await)
    }

    /// Applies a content edit to the archive record.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for missing records or exhausted retries.
    pub fn edit<F>(
        &self,
        id: &str,
        actor: &UserEmail,
        apply_fields: F,
    ) -> Result<ObjectRecord, ApiError>
    where
        F: Fn(&mut ObjectRecord) + Send + Sync,
    {
        let now = UtcTimestamp::now();
        let actor = actor.clone();
        let (updated, _etag) = self.writer.update(id, move |record| {
            apply_fields(record);
            record.modified_by = Some(actor.clone());
            record.modified_at = Some(now);
            record.append_modification(ModificationEntry {
                timestamp: now,
                user_id: actor.clone(),
                modification_type: ModificationType::Updated,
                meeting_metadata: None,
            });
            Ok(())
        })?;
        Ok(updated)
    }

    /// Writes announcement-update triggers after a content edit.
    ///
    /// Content updates keep the record status, so the trigger metadata is
    /// overridden to the `announcement_update` routing hint.
    pub async fn announce_update(
        &self,
        record: ObjectRecord,
        cancel: CancellationToken,
    ) -> TransitionResponse {
        let record = Arc::new(record);
        let gateway = self.gateway.clone();
        let shared = Arc::clone(&record);
        let job: CustomerJob = Arc::new(move |code, _token| {
            let key = customer_key(code, shared.id_str()).map_err(|err| err.to_string())?;
            let mut metadata = routing_metadata(&shared, Some(code));
            metadata.insert(
                META_REQUEST_TYPE.to_string(),
                RequestType::AnnouncementUpdate.as_str().to_string(),
            );
            gateway
                .put_json(&key, shared.as_ref(), &metadata, PutCondition::Overwrite)
                .map_err(|err| err.to_string())?;
            Ok(None)
        });
        let report =
            run_fanout(self.targets_for(&record), job, self.max_concurrency, cancel).await;
        self.audit_fanout(record.id_str(), "announcement_update", &report);
        TransitionResponse {
            object_id: record.id_str().to_string(),
            status: record.status,
            version: record.version,
            update_results: report.outcomes,
            summary: report.summary,
        }
    }

    // ------------------------------------------------------------------
    // Reaction dispatch
    // ------------------------------------------------------------------

    /// Routes the reaction for a record's current status.
    ///
    /// Unknown statuses cannot be represented; draft records produce an
    /// empty reaction.
    pub async fn react(
        &self,
        record: ObjectRecord,
        cancel: CancellationToken,
    ) -> TransitionResponse {
        match record.status {
            ObjectStatus::Draft => TransitionResponse {
                object_id: record.id_str().to_string(),
                status: record.status,
                version: record.version,
                update_results: Vec::new(),
                summary: FanoutSummary {
                    total: 0,
                    successful: 0,
                    failed: 0,
                    skipped: 0,
                },
            },
            ObjectStatus::Submitted => self.react_submitted(record, cancel).await,
            ObjectStatus::Approved => self.react_approved(record, cancel).await,
            ObjectStatus::Cancelled => self.react_cancelled(record, cancel).await,
            ObjectStatus::Completed => self.react_completed(record, cancel).await,
        }
    }

    /// Submitted: approval-request mail to the approver list plus triggers.
    async fn react_submitted(
        &self,
        record: ObjectRecord,
        cancel: CancellationToken,
    ) -> TransitionResponse {
        let message = EmailMessage::from(render(&record, EmailKind::ApprovalRequest));
        match self.mail.send_to_list(&self.approver_list, &message) {
            Ok(_) => self.audit.record_side_effect(&SideEffectAuditEvent::new(
                record.id_str(),
                "approval_request_mail",
                true,
                None,
                None,
            )),
            Err(err) => self.audit.record_side_effect(&SideEffectAuditEvent::new(
                record.id_str(),
                "approval_request_mail",
                false,
                Some(err.to_string()),
                None,
            )),
        }
        self.trigger_only_fanout(record, cancel).await
    }

    /// Approved: optional meeting, then typed mail to every customer.
    async fn react_approved(
        &self,
        record: ObjectRecord,
        cancel: CancellationToken,
    ) -> TransitionResponse {
        let record = self.ensure_meeting(record);
        self.effect_fanout(record, EmailKind::Approved, cancel).await
    }

    /// Cancelled: cancel any stored meeting, then cancellation mail.
    async fn react_cancelled(
        &self,
        record: ObjectRecord,
        cancel: CancellationToken,
    ) -> TransitionResponse {
        if let Some(meeting) = &record.meeting_metadata {
            match self.meetings.cancel(&meeting.meeting_id) {
                Ok(()) => self.audit.record_side_effect(&SideEffectAuditEvent::new(
                    record.id_str(),
                    "meeting_cancel",
                    true,
                    None,
                    None,
                )),
                Err(err) => self.audit.record_side_effect(&SideEffectAuditEvent::new(
                    record.id_str(),
                    "meeting_cancel",
                    false,
                    Some(err.to_string()),
                    None,
                )),
            }
        }
        self.effect_fanout(record, EmailKind::Cancelled, cancel).await
    }

    /// Completed: completion mail plus survey provisioning per customer.
    async fn react_completed(
        &self,
        record: ObjectRecord,
        cancel: CancellationToken,
    ) -> TransitionResponse {
        let response = self.effect_fanout(record, EmailKind::Completed, cancel).await;
        self.stamp_survey_from_outcomes(&response);
        response
    }

    // ------------------------------------------------------------------
    // Meeting handling
    // ------------------------------------------------------------------

    /// Schedules the meeting for an approved record when asked and absent.
    ///
    /// Failures are logged and non-fatal: the transition proceeds and
    /// emails go out without a join URL.
    fn ensure_meeting(&self, record: ObjectRecord) -> ObjectRecord {
        if !record.include_meeting || record.meeting_metadata.is_some() {
            return record;
        }
        let now = UtcTimestamp::now();
        let (start_time, end_time) = meeting_window(&record, now);
        let attendees: Vec<String> = record
            .customers
            .iter()
            .map(|code| contact_list_for(record.object_type, code))
            .collect();
        let request = MeetingRequest {
            subject: meeting_subject(&record),
            body: record
                .summary
                .clone()
                .or_else(|| record.description.clone())
                .unwrap_or_default(),
            start_time,
            end_time,
            organizer: self.organizer.clone(),
            attendees,
        };
        let metadata = match self.meetings.schedule(&request) {
            Ok(metadata) => {
                self.audit.record_side_effect(&SideEffectAuditEvent::new(
                    record.id_str(),
                    "meeting_schedule",
                    true,
                    None,
                    None,
                ));
                metadata
            }
            Err(err) => {
                self.audit.record_side_effect(&SideEffectAuditEvent::new(
                    record.id_str(),
                    "meeting_schedule",
                    false,
                    Some(err.to_string()),
                    None,
                ));
                return record;
            }
        };
        let actor = record
            .approved_by
            .clone()
            .or_else(|| record.modified_by.clone());
        let Some(actor) = actor else {
            return record;
        };
        let stamped = self.writer.update(record.id_str(), move |next| {
            if next.meeting_metadata.is_some() {
                return Ok(());
            }
            next.meeting_metadata = Some(metadata.clone());
            next.append_modification(ModificationEntry {
                timestamp: now,
                user_id: actor.clone(),
                modification_type: ModificationType::MeetingScheduled,
                meeting_metadata: Some(metadata.clone()),
            });
            Ok(())
        });
        match stamped {
            Ok((updated, _etag)) => updated,
            Err(err) => {
                self.audit.record_side_effect(&SideEffectAuditEvent::new(
                    record.id_str(),
                    "meeting_stamp",
                    false,
                    Some(err.to_string()),
                    None,
                ));
                record
            }
        }
    }

    // ------------------------------------------------------------------
    // Fan-out
    // ------------------------------------------------------------------

    /// Builds the fan-out targets for a record.
    fn targets_for(&self, record: &ObjectRecord) -> Vec<FanoutTarget> {
        record
            .customers
            .iter()
            .map(|code| FanoutTarget {
                code: code.clone(),
                name: self.customer_name(code),
            })
            .collect()
    }

    /// Fan-out writing only trigger copies (submitted reaction).
    async fn trigger_only_fanout(
        &self,
        record: ObjectRecord,
        cancel: CancellationToken,
    ) -> TransitionResponse {
        let record = Arc::new(record);
        let gateway = self.gateway.clone();
        let shared = Arc::clone(&record);
        let job: CustomerJob = Arc::new(move |code, _token| {
            write_trigger(&gateway, &shared, code)?;
            Ok(None)
        });
        let report =
            run_fanout(self.targets_for(&record), job, self.max_concurrency, cancel).await;
        self.audit_fanout(record.id_str(), "trigger_fanout", &report);
        TransitionResponse {
            object_id: record.id_str().to_string(),
            status: record.status,
            version: record.version,
            update_results: report.outcomes,
            summary: report.summary,
        }
    }

    /// Full per-customer reaction: trigger, typed mail, survey, and queue.
    async fn effect_fanout(
        &self,
        record: ObjectRecord,
        kind: EmailKind,
        cancel: CancellationToken,
    ) -> TransitionResponse {
        let record = Arc::new(record);
        let message = Arc::new(EmailMessage::from(render(&record, kind)));
        let gateway = self.gateway.clone();
        let mail = Arc::clone(&self.mail);
        let surveys = Arc::clone(&self.surveys);
        let queue = Arc::clone(&self.queue);
        let shared = Arc::clone(&record);
        let provision_survey = record.status == ObjectStatus::Completed
            && record.survey_id.is_none();
        let job: CustomerJob = Arc::new(move |code, token| {
            write_trigger(&gateway, &shared, code)?;
            if token.is_cancelled() {
                return Err("cancelled before delivery".to_string());
            }
            let contact_list = contact_list_for(shared.object_type, code);
            mail.send_to_list(&contact_list, &message).map_err(|err| err.to_string())?;
            let mut result = json!({ "contact_list": contact_list });
            if provision_survey {
                let completer = shared
                    .completed_by
                    .clone()
                    .or_else(|| shared.modified_by.clone())
                    .ok_or_else(|| "completed record missing completer".to_string())?;
                let outcome = surveys
                    .provision(&shared, code, &completer, UtcTimestamp::now())
                    .map_err(|err| err.to_string())?;
                if let Value::Object(fields) = &mut result {
                    fields.insert("survey_id".to_string(), json!(outcome.survey_id));
                    fields.insert("survey_url".to_string(), json!(outcome.survey_url));
                    fields
                        .insert("survey_created_at".to_string(), json!(outcome.created_at));
                }
            }
            let notification = QueueNotification {
                object_id: shared.id_str().to_string(),
                object_type: shared.object_type.as_str().to_string(),
                customer_code: code.to_string(),
                status: shared.status.as_str().to_string(),
                request_type: RequestType::for_transition(shared.object_type.kind(), shared.status)
                    .map(|request_type| request_type.as_str().to_string()),
                timestamp: UtcTimestamp::now().to_rfc3339(),
            };
            // Queue publication is best effort; delivery already succeeded.
            let _ = queue.publish(&notification);
            Ok(Some(result))
        });
        let report =
            run_fanout(self.targets_for(&record), job, self.max_concurrency, cancel).await;
        self.audit_fanout(record.id_str(), "mail_fanout", &report);
        TransitionResponse {
            object_id: record.id_str().to_string(),
            status: record.status,
            version: record.version,
            update_results: report.outcomes,
            summary: report.summary,
        }
    }

    /// Stamps the survey handle onto the record after a completed fan-out.
    fn stamp_survey_from_outcomes(&self, response: &TransitionResponse) {
        let survey = response.update_results.iter().find_map(|outcome| {
            let result = outcome.result.as_ref()?;
            let survey_id = result.get("survey_id")?.as_str()?.to_string();
            let survey_url = result.get("survey_url")?.as_str()?.to_string();
            let created_at = result
                .get("survey_created_at")
                .and_then(Value::as_str)
                .and_then(|raw| UtcTimestamp::parse(raw).ok());
            Some((survey_id, survey_url, created_at))
        });
        let Some((survey_id, survey_url, created_at)) = survey else {
            return;
        };
        let stamped = self.writer.update(&response.object_id, move |record| {
            if record.survey_id.is_some() {
                return Ok(());
            }
            record.survey_id = Some(survey_id.clone());
            record.survey_url = Some(survey_url.clone());
            record.survey_created_at = created_at;
            if let (Some(actor), Some(timestamp)) =
                (record.completed_by.clone(), created_at)
            {
                record.append_modification(ModificationEntry {
                    timestamp,
                    user_id: actor,
                    modification_type: ModificationType::SurveyCreated,
                    meeting_metadata: None,
                });
            }
            Ok(())
        });
        if let Err(err) = stamped {
            self.audit.record_side_effect(&SideEffectAuditEvent::new(
                &response.object_id,
                "survey_stamp",
                false,
                Some(err.to_string()),
                None,
            ));
        }
    }

    /// Records per-customer fan-out outcomes to the audit sink.
    fn audit_fanout(&self, object_id: &str, effect: &'static str, report: &FanoutReport) {
        for outcome in &report.outcomes {
            self.audit.record_side_effect(&SideEffectAuditEvent::new(
                object_id,
                effect,
                outcome.success,
                outcome.error.clone(),
                Some(outcome.customer_code.to_string()),
            ));
        }
    }
}

// ============================================================================
// SECTION: Trigger Writes
// ============================================================================

/// Writes the transient trigger copy for one customer.
///
/// The trigger mirrors the archive record at the instant of write and
/// carries the routing-hint metadata. Its creation is the reaction signal
/// for downstream observers; callers must have completed the archive write
/// before issuing it.
fn write_trigger(
    gateway: &ObjectGateway,
    record: &ObjectRecord,
    code: &CustomerCode,
) -> Result<(), String> {
    let key = customer_key(code, record.id_str()).map_err(|err| err.to_string())?;
    let metadata = routing_metadata(record, Some(code));
    gateway
        .put_json(&key, record, &metadata, PutCondition::Overwrite)
        .map_err(|err| err.to_string())?;
    Ok(())
}

// ============================================================================
// SECTION: Upstream Tag Helper
// ============================================================================

/// Wraps an upstream failure with its service tag.
#[must_use]
pub fn upstream(service: &'static str, message: impl Into<String>) -> ApiError {
    ApiError::Upstream {
        service,
        message: message.into(),
    }
}
