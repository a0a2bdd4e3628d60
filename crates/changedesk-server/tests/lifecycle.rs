// crates/changedesk-server/tests/lifecycle.rs
// ============================================================================
// Module: Lifecycle Integration Tests
// Description: End-to-end change and announcement lifecycles over the facade.
// Purpose: Exercise submit/approve/cancel/complete against the memory store.
// ============================================================================

//! End-to-end change and announcement lifecycle integration tests.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use changedesk_core::CustomerCode;
use changedesk_core::ObjectRecord;
use changedesk_notify::MailTransport;
use changedesk_notify::RecordingMailTransport;
use changedesk_notify::RecordingMeetingClient;
use changedesk_server::AppState;
use changedesk_server::AuthPolicy;
use changedesk_server::NoopAuditSink;
use changedesk_server::NoopMetrics;
use changedesk_server::Reactor;
use changedesk_server::ReactorAuditSink;
use changedesk_server::RecordingQueuePublisher;
use changedesk_server::build_router;
use changedesk_server::reactor::ReactorClients;
use changedesk_store::MemoryObjectStore;
use changedesk_store::ObjectGateway;
use changedesk_store::ObjectStore;
use changedesk_survey::RecordingSurveyService;
use changedesk_survey::SurveyProvisioner;
use changedesk_survey::SurveyService;
use changedesk_survey::WebhookIngest;
use serde_json::Value;
use serde_json::json;
use tokio::sync::Semaphore;
use tower::util::ServiceExt;

/// Test harness exposing the recording fakes behind an [`AppState`].
struct Harness {
    /// Application state under test.
    state: Arc<AppState>,
    /// Backing store.
    store: Arc<MemoryObjectStore>,
    /// Recording mail transport.
    mail: Arc<RecordingMailTransport>,
    /// Recording meeting client.
    meetings: Arc<RecordingMeetingClient>,
    /// Recording survey service.
    surveys: Arc<RecordingSurveyService>,
    /// Recording queue publisher.
    queue: Arc<RecordingQueuePublisher>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryObjectStore::new("test-bucket"));
    let gateway = ObjectGateway::new(Arc::clone(&store) as Arc<dyn ObjectStore>);
    let mail = Arc::new(RecordingMailTransport::new());
    let meetings = Arc::new(RecordingMeetingClient::new());
    let survey_service = Arc::new(RecordingSurveyService::new());
    let provisioner = Arc::new(SurveyProvisioner::new(
        Arc::clone(&survey_service) as Arc<dyn SurveyService>,
        gateway.clone(),
    ));
    let queue = Arc::new(RecordingQueuePublisher::new());
    let audit: Arc<dyn ReactorAuditSink> = Arc::new(NoopAuditSink);
    let mut directory = BTreeMap::new();
    directory.insert(CustomerCode::parse("hts").expect("code"), "HTS Corp".to_string());
    directory.insert(CustomerCode::parse("cds").expect("code"), "CDS Inc".to_string());
    let reactor = Arc::new(Reactor::new(
        gateway.clone(),
        ReactorClients {
            mail: Arc::clone(&mail) as Arc<dyn MailTransport>,
            meetings: Arc::clone(&meetings) as Arc<dyn changedesk_notify::MeetingClient>,
            surveys: provisioner,
            queue: Arc::clone(&queue) as Arc<dyn changedesk_server::QueuePublisher>,
            audit: Arc::clone(&audit),
        },
        directory,
        "ccoe-approvers".to_string(),
        "ccoe@example.com".to_string(),
        4,
    ));
    let state = Arc::new(AppState {
        reactor,
        policy: AuthPolicy::new(vec!["example.com".to_string()], Vec::new()),
        audit,
        metrics: Arc::new(NoopMetrics),
        webhook: WebhookIngest::new(gateway, "wh-secret-123"),
        inflight: Arc::new(Semaphore::new(16)),
        max_body_bytes: 2 * 1024 * 1024,
    });
    Harness {
        state,
        store,
        mail,
        meetings,
        surveys: survey_service,
        queue,
    }
}

async fn send(
    state: &Arc<AppState>,
    method: &str,
    path: &str,
    body: Option<Value>,
    email: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("x-authenticated", "true")
        .header("x-user-email", email);
    let request = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            builder.body(Body::from(value.to_string())).expect("request")
        }
        None => builder.body(Body::empty()).expect("request"),
    };
    let response = build_router(Arc::clone(state)).oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn read_record(store: &MemoryObjectStore, key: &str) -> ObjectRecord {
    let stored = store.get(key).expect("object");
    serde_json::from_slice(&stored.bytes).expect("decode")
}

async fn submit_change(harness: &Harness, include_meeting: bool) -> String {
    let (status, body) = send(
        &harness.state,
        "POST",
        "/upload",
        Some(json!({
            "object_type": "change",
            "changeTitle": "Security Baseline",
            "description": "Roll out the hardened security baseline",
            "customers": ["hts", "cds"],
            "includeMeeting": include_meeting,
            "implementationStart": "2025-10-20T02:00:00Z",
            "implementationEnd": "2025-10-20T04:00:00Z",
        })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {body}");
    body["changeId"].as_str().expect("changeId").to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_create_and_submit_change() {
    let harness = harness();
    let (status, body) = send(
        &harness.state,
        "POST",
        "/upload",
        Some(json!({
            "object_type": "change",
            "changeTitle": "Security Baseline",
            "description": "Roll out the hardened security baseline",
            "customers": ["hts", "cds"],
            "implementationStart": "2025-10-20T02:00:00Z",
            "implementationEnd": "2025-10-20T04:00:00Z",
        })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["changeId"].as_str().expect("changeId");
    assert!(id.starts_with("CHG-"), "generated id: {id}");
    assert_eq!(body["status"], "submitted");
    assert_eq!(body["version"], 1);
    assert_eq!(body["summary"]["successful"], 2);

    let archive = read_record(&harness.store, &format!("archive/{id}.json"));
    assert_eq!(archive.version, 1);
    assert_eq!(archive.submitted_by.as_ref().map(|user| user.as_str()), Some("alice@example.com"));
    assert_eq!(archive.prior_status.map(|status| status.as_str()), Some("draft"));

    for code in ["hts", "cds"] {
        let trigger = harness
            .store
            .get(&format!("customers/{code}/{id}.json"))
            .expect("trigger copy");
        assert_eq!(
            trigger.metadata.get("request-type").map(String::as_str),
            Some("approval_request")
        );
        assert_eq!(trigger.metadata.get("customer-code").map(String::as_str), Some(code));
        assert_eq!(trigger.metadata.get("change-id").map(String::as_str), Some(id));
    }

    // No draft remains for the submitted identifier.
    assert!(harness.store.head(&format!("drafts/{id}.json")).expect("head").is_none());

    // The approval request routed to the approver list.
    let sent = harness.mail.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ccoe-approvers");
    assert!(sent[0].1.subject.contains("Approval required"));
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_approve_with_meeting() {
    let harness = harness();
    let id = submit_change(&harness, true).await;
    let (status, body) = send(
        &harness.state,
        "POST",
        &format!("/changes/{id}/approve"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "approve failed: {body}");
    assert_eq!(body["status"], "approved");
    assert_eq!(body["summary"]["successful"], 2);

    let archive = read_record(&harness.store, &format!("archive/{id}.json"));
    assert_eq!(archive.status.as_str(), "approved");
    assert_eq!(archive.approved_by.as_ref().map(|user| user.as_str()), Some("alice@example.com"));
    assert!(archive.version >= 2);
    let kinds: Vec<String> = archive
        .modifications
        .iter()
        .map(|entry| {
            serde_json::to_value(entry.modification_type)
                .expect("encode")
                .as_str()
                .expect("label")
                .to_string()
        })
        .collect();
    let approved_index =
        kinds.iter().position(|kind| kind == "approved").expect("approved entry");
    let meeting_index =
        kinds.iter().position(|kind| kind == "meeting_scheduled").expect("meeting entry");
    assert!(meeting_index > approved_index, "meeting entry follows the approval");
    let meeting_entry = &archive.modifications[meeting_index];
    let metadata = meeting_entry.meeting_metadata.as_ref().expect("entry metadata");
    assert!(!metadata.meeting_id.is_empty());
    let stamped = archive.meeting_metadata.as_ref().expect("record metadata");
    assert_eq!(stamped.meeting_id, metadata.meeting_id);
    assert_eq!(stamped.subject, "Change Event: Security Baseline");

    // The meeting window follows the implementation window.
    let scheduled = harness.meetings.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].start_time.to_rfc3339(), "2025-10-20T02:00:00Z");
    assert_eq!(scheduled[0].end_time.to_rfc3339(), "2025-10-20T04:00:00Z");

    // Trigger copies carry the approved-change hint and the join URL.
    for code in ["hts", "cds"] {
        let trigger = harness
            .store
            .get(&format!("customers/{code}/{id}.json"))
            .expect("trigger copy");
        assert_eq!(
            trigger.metadata.get("request-type").map(String::as_str),
            Some("approved_change")
        );
        let copy: ObjectRecord = serde_json::from_slice(&trigger.bytes).expect("decode");
        assert!(copy.meeting_metadata.is_some(), "trigger mirrors the stamped archive");
    }

    // Typed approval mail went to each per-customer change list.
    let lists: Vec<String> = harness.mail.sent().into_iter().map(|(list, _)| list).collect();
    assert!(lists.contains(&"hts-changes".to_string()));
    assert!(lists.contains(&"cds-changes".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_repeated_approve_is_idempotent() {
    let harness = harness();
    let id = submit_change(&harness, true).await;
    let (status, _) = send(
        &harness.state,
        "POST",
        &format!("/changes/{id}/approve"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first = read_record(&harness.store, &format!("archive/{id}.json"));
    let first_meeting =
        first.meeting_metadata.as_ref().expect("meeting after first approve").clone();

    // Re-delivery of the same approved status re-runs side effects only
    // behind their done markers.
    let (status, _) = send(
        &harness.state,
        "POST",
        &format!("/changes/{id}/approve"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second = read_record(&harness.store, &format!("archive/{id}.json"));
    assert_eq!(
        second.meeting_metadata.as_ref().expect("meeting persists").meeting_id,
        first_meeting.meeting_id,
        "at most one meeting is ever scheduled"
    );
    assert_eq!(harness.meetings.scheduled().len(), 1);
    let approvals = second
        .modifications
        .iter()
        .filter(|entry| {
            serde_json::to_value(entry.modification_type).expect("encode") == json!("approved")
        })
        .count();
    assert_eq!(approvals, 1, "approval entries deduplicate");
    assert!(second.survey_id.is_none(), "approval never assigns a survey");
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_concurrent_approves_serialize() {
    let harness = harness();
    let id = submit_change(&harness, false).await;
    let path = format!("/changes/{id}/approve");
    let first = send(&harness.state, "POST", &path, None, "alice@example.com");
    let second = send(&harness.state, "POST", &path, None, "alice@example.com");
    let (first, second) = tokio::join!(first, second);
    let ok_count = [&first, &second]
        .iter()
        .filter(|(status, _)| *status == StatusCode::OK)
        .count();
    assert!(ok_count >= 1, "at least one approve must win");
    for (status, _) in [&first, &second] {
        assert!(
            *status == StatusCode::OK || *status == StatusCode::CONFLICT,
            "losers surface as conflicts, never 5xx"
        );
    }
    let archive = read_record(&harness.store, &format!("archive/{id}.json"));
    assert_eq!(archive.status.as_str(), "approved");
    let approvals = archive
        .modifications
        .iter()
        .filter(|entry| {
            serde_json::to_value(entry.modification_type).expect("encode") == json!("approved")
        })
        .count();
    assert_eq!(approvals, 1, "exactly one approval entry survives the race");
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_cancel_after_approve() {
    let harness = harness();
    let id = submit_change(&harness, true).await;
    send(&harness.state, "POST", &format!("/changes/{id}/approve"), None, "alice@example.com")
        .await;
    let meeting_id = read_record(&harness.store, &format!("archive/{id}.json"))
        .meeting_metadata
        .expect("meeting")
        .meeting_id;

    let (status, body) = send(
        &harness.state,
        "POST",
        &format!("/changes/{id}/cancel"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "cancel failed: {body}");
    let archive = read_record(&harness.store, &format!("archive/{id}.json"));
    assert_eq!(archive.status.as_str(), "cancelled");
    assert_eq!(archive.prior_status.map(|status| status.as_str()), Some("approved"));
    assert!(
        archive.meeting_metadata.is_some(),
        "cancellation appends, it never rewrites history"
    );

    let trigger = harness.store.get(&format!("customers/hts/{id}.json")).expect("trigger");
    assert_eq!(
        trigger.metadata.get("request-type").map(String::as_str),
        Some("change_cancelled")
    );
    assert_eq!(harness.meetings.cancelled(), vec![meeting_id]);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_complete_provisions_survey() {
    let harness = harness();
    let id = submit_change(&harness, false).await;
    send(&harness.state, "POST", &format!("/changes/{id}/approve"), None, "alice@example.com")
        .await;
    let (status, body) = send(
        &harness.state,
        "POST",
        &format!("/changes/{id}/complete"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "complete failed: {body}");
    assert_eq!(body["status"], "completed");

    let archive_key = format!("archive/{id}.json");
    let archive = read_record(&harness.store, &archive_key);
    assert_eq!(archive.status.as_str(), "completed");
    assert!(archive.survey_id.is_some(), "survey id is stamped on the record");
    assert!(archive.survey_url.is_some());

    // The archive object metadata carries the survey handle.
    let stored = harness.store.get(&archive_key).expect("archive object");
    assert!(stored.metadata.contains_key("survey-id"));
    assert!(stored.metadata.contains_key("survey-url"));

    // One form snapshot exists per customer.
    for code in ["hts", "cds"] {
        let snapshots =
            harness.store.list(&format!("surveys/forms/{code}/")).expect("snapshots");
        assert_eq!(snapshots.len(), 1, "one form snapshot for {code}");
        assert!(snapshots[0].key.contains(&id));
    }
    assert_eq!(harness.surveys.forms().len(), 2);

    // Completion mail dispatched per customer, and queue notifications flow.
    let lists: Vec<String> = harness.mail.sent().into_iter().map(|(list, _)| list).collect();
    assert!(lists.contains(&"hts-changes".to_string()));
    assert!(lists.contains(&"cds-changes".to_string()));
    let published = harness.queue.published();
    assert!(
        published.iter().any(|notification| notification.status == "completed"),
        "per-customer completion notifications publish"
    );

    // Completing again provisions nothing new.
    send(&harness.state, "POST", &format!("/changes/{id}/complete"), None, "alice@example.com")
        .await;
    assert_eq!(harness.surveys.forms().len(), 2, "survey provisioning is idempotent");
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_announcement_lifecycle() {
    let harness = harness();
    let (status, body) = send(
        &harness.state,
        "POST",
        "/upload",
        Some(json!({
            "object_type": "announcement_cic",
            "announcement_id": "CIC-2025-001",
            "announcementTitle": "Quarterly Platform Update",
            "summary": "Everything shipping this quarter",
            "content": "Full details of the quarterly update",
            "customers": ["hts", "cds"],
            "includeMeeting": true,
        })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "announcement upload failed: {body}");
    assert_eq!(body["announcementId"], "CIC-2025-001");
    assert_eq!(body["status"], "submitted");

    let trigger = harness
        .store
        .get("customers/hts/CIC-2025-001.json")
        .expect("announcement trigger");
    assert_eq!(
        trigger.metadata.get("request-type").map(String::as_str),
        Some("announcement_approval_request")
    );

    let (status, _) = send(
        &harness.state,
        "POST",
        "/upload",
        Some(json!({
            "action": "update_announcement",
            "announcement_id": "CIC-2025-001",
            "status": "approved",
        })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let archive = read_record(&harness.store, "archive/CIC-2025-001.json");
    let meeting = archive.meeting_metadata.as_ref().expect("meeting scheduled");
    assert!(meeting.subject.starts_with("CIC Event:"), "subject: {}", meeting.subject);

    // Approved announcements use the blue CIC template on the subtype list.
    let cic_mail: Vec<_> = harness
        .mail
        .sent()
        .into_iter()
        .filter(|(list, _)| list == "cic-announce")
        .collect();
    assert!(!cic_mail.is_empty(), "cic announcements address the cic list");
    assert!(cic_mail.iter().any(|(_, message)| message.html.contains("#2563eb")));

    let trigger = harness
        .store
        .get("customers/cds/CIC-2025-001.json")
        .expect("approved trigger");
    assert_eq!(
        trigger.metadata.get("request-type").map(String::as_str),
        Some("approved_announcement")
    );

    let (status, _) = send(
        &harness.state,
        "POST",
        "/upload",
        Some(json!({
            "action": "update_announcement",
            "announcement_id": "CIC-2025-001",
            "status": "completed",
        })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Announcement fields survive every status change; no change conversion.
    let archive = read_record(&harness.store, "archive/CIC-2025-001.json");
    assert_eq!(archive.object_type.as_str(), "announcement_cic");
    assert_eq!(archive.title, "Quarterly Platform Update");
    assert_eq!(archive.summary.as_deref(), Some("Everything shipping this quarter"));
    assert_eq!(archive.content.as_deref(), Some("Full details of the quarterly update"));
    assert!(archive.change_id.is_none());

    // The survey workspace is the CIC workspace.
    let forms = harness.surveys.forms();
    assert!(!forms.is_empty());
    assert!(forms.iter().all(|form| form.workspace == "cic"));
    assert!(forms.iter().all(|form| form.hidden.event_subtype.as_deref() == Some("cic")));
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_mail_failure_reports_summary_not_error() {
    let harness = harness();
    let id = submit_change(&harness, false).await;
    harness.mail.fail_list("cds-changes");
    let (status, body) = send(
        &harness.state,
        "POST",
        &format!("/changes/{id}/approve"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "partial failures never 5xx");
    assert_eq!(body["summary"]["total"], 2);
    assert_eq!(body["summary"]["successful"], 1);
    assert_eq!(body["summary"]["failed"], 1);
    let results = body["updateResults"].as_array().expect("results");
    assert_eq!(results.len(), 2, "every customer appears exactly once");
    let failed = results
        .iter()
        .find(|outcome| outcome["customer_code"] == "cds")
        .expect("cds outcome");
    assert_eq!(failed["success"], false);
    assert!(failed["error"].as_str().expect("error").contains("cds-changes"));
}

#[tokio::test(flavor = "multi_thread")]
async fn version_snapshots_track_every_write() {
    let harness = harness();
    let id = submit_change(&harness, false).await;
    send(&harness.state, "POST", &format!("/changes/{id}/approve"), None, "alice@example.com")
        .await;
    let (status, listing) = send(
        &harness.state,
        "GET",
        &format!("/changes/{id}/versions"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let versions = listing["versions"].as_array().expect("versions");
    assert!(!versions.is_empty());

    // P1: every archived version v has a snapshot of the v-state payload.
    let (status, snapshot) = send(
        &harness.state,
        "GET",
        &format!("/changes/{id}/versions/1"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["version"], 1);
    assert_eq!(snapshot["status"], "submitted");
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_creates_a_new_version() {
    let harness = harness();
    let id = submit_change(&harness, false).await;
    let (status, updated) = send(
        &harness.state,
        "PUT",
        &format!("/changes/{id}"),
        Some(json!({ "title": "Security Baseline v2" })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Security Baseline v2");
    assert_eq!(updated["version"], 2);

    // Non-owners cannot edit.
    let (status, _) = send(
        &harness.state,
        "PUT",
        &format!("/changes/{id}"),
        Some(json!({ "title": "hijack" })),
        "bob@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread")]
async fn attachments_round_trip_from_upload_to_record_and_mail() {
    let harness = harness();
    let (status, body) = send(
        &harness.state,
        "POST",
        "/upload",
        Some(json!({
            "object_type": "change",
            "changeTitle": "Security Baseline",
            "description": "Roll out the hardened security baseline",
            "customers": ["hts"],
            "attachments": [
                {
                    "name": "runbook.pdf",
                    "storeKey": "attachments/runbook.pdf",
                    "size": 2048,
                    "uploadedAt": "2025-10-19T12:00:00Z",
                },
                { "name": "rollback.md", "storeKey": "attachments/rollback.md", "size": 512 },
            ],
        })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {body}");
    let id = body["changeId"].as_str().expect("changeId").to_string();

    let (status, fetched) = send(
        &harness.state,
        "GET",
        &format!("/changes/{id}"),
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let attachments = fetched["attachments"].as_array().expect("attachments");
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0]["name"], "runbook.pdf");
    assert_eq!(attachments[0]["store_key"], "attachments/runbook.pdf");
    assert_eq!(attachments[0]["size"], 2048);
    assert_eq!(attachments[0]["uploaded_at"], "2025-10-19T12:00:00Z");
    assert_eq!(attachments[1]["name"], "rollback.md");
    assert!(
        attachments[1]["uploaded_at"].as_str().is_some(),
        "missing upload instants default to the request instant"
    );

    // The approval-request mail lists the attachments.
    let sent = harness.mail.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.html.contains("runbook.pdf"));
    assert!(sent[0].1.text.contains("rollback.md"));

    // An edit replaces the attachment list and survives the write.
    let (status, updated) = send(
        &harness.state,
        "PUT",
        &format!("/changes/{id}"),
        Some(json!({
            "attachments": [
                { "name": "final-report.pdf", "storeKey": "attachments/final.pdf", "size": 9000 },
            ],
        })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let replaced = updated["attachments"].as_array().expect("attachments");
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0]["name"], "final-report.pdf");
    let archive = read_record(&harness.store, &format!("archive/{id}.json"));
    assert_eq!(archive.attachments.len(), 1);
    assert_eq!(archive.attachments[0].store_key, "attachments/final.pdf");

    // Malformed attachment payloads fail validation.
    let (status, rejected) = send(
        &harness.state,
        "POST",
        "/upload",
        Some(json!({
            "object_type": "change",
            "changeTitle": "Second Baseline",
            "description": "Another rollout",
            "customers": ["hts"],
            "attachments": [{ "name": "  ", "storeKey": "attachments/x", "size": 1 }],
        })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected["error"], "ValidationError");
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_resets_identity_and_attribution() {
    let harness = harness();
    let id = submit_change(&harness, true).await;
    let (status, copy) = send(
        &harness.state,
        "POST",
        &format!("/changes/{id}/duplicate"),
        None,
        "bob@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "duplicate failed: {copy}");
    let new_id = copy["change_id"].as_str().expect("fresh id");
    assert_ne!(new_id, id, "duplicates take a fresh identifier");
    assert_eq!(copy["status"], "draft");
    assert_eq!(copy["version"], 0);
    assert_eq!(copy["title"], "Security Baseline");
    assert_eq!(copy["created_by"], "bob@example.com");
    assert!(copy.get("submitted_by").is_none(), "submission attribution clears");
    assert!(copy.get("meeting_metadata").is_none());
    assert!(
        harness.store.head(&format!("drafts/{new_id}.json")).expect("head").is_some(),
        "the duplicate lands in drafts/"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn search_and_recent_filter_the_archive() {
    let harness = harness();
    let id = submit_change(&harness, false).await;
    let (status, results) = send(
        &harness.state,
        "POST",
        "/changes/search",
        Some(json!({ "query": "baseline", "status": "submitted" })),
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["count"], 1);

    let (_, empty) = send(
        &harness.state,
        "POST",
        "/changes/search",
        Some(json!({ "query": "nonexistent phrase" })),
        "alice@example.com",
    )
    .await;
    assert_eq!(empty["count"], 0);

    let (_, by_customer) = send(
        &harness.state,
        "POST",
        "/changes/search",
        Some(json!({ "customers": ["hts"] })),
        "alice@example.com",
    )
    .await;
    assert_eq!(by_customer["count"], 1);

    let (status, recent) = send(
        &harness.state,
        "GET",
        "/changes/recent?limit=5",
        None,
        "alice@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recent["items"][0]["change_id"], id);
}
