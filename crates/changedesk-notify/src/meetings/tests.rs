#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use changedesk_core::AnnouncementId;
use changedesk_core::AnnouncementSubtype;
use changedesk_core::ChangeId;
use changedesk_core::CustomerCode;
use changedesk_core::UserEmail;

use super::*;

fn now() -> UtcTimestamp {
    UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("parse")
}

fn change_record() -> ObjectRecord {
    ObjectRecord::new_change(
        ChangeId::generate(now()),
        "Security Baseline",
        vec![CustomerCode::parse("hts").expect("code")],
        UserEmail::parse("alice@example.com").expect("email"),
        now(),
    )
}

fn cic_record() -> ObjectRecord {
    ObjectRecord::new_announcement(
        AnnouncementSubtype::Cic,
        AnnouncementId::parse("CIC-2025-001").expect("id"),
        "Quarterly Update",
        vec![CustomerCode::parse("hts").expect("code")],
        UserEmail::parse("alice@example.com").expect("email"),
        now(),
    )
}

#[test]
fn subjects_follow_the_kind_label() {
    assert_eq!(meeting_subject(&change_record()), "Change Event: Security Baseline");
    assert_eq!(meeting_subject(&cic_record()), "CIC Event: Quarterly Update");
    let mut finops = cic_record();
    finops.object_type = changedesk_core::ObjectType::Announcement(AnnouncementSubtype::Finops);
    assert_eq!(meeting_subject(&finops), "FinOps Event: Quarterly Update");
}

#[test]
fn window_prefers_the_implementation_dates() {
    let mut record = change_record();
    record.implementation_start = Some(UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("ts"));
    record.implementation_end = Some(UtcTimestamp::parse("2025-10-20T04:00:00Z").expect("ts"));
    let (start, end) = meeting_window(&record, now());
    assert_eq!(start, record.implementation_start.expect("start"));
    assert_eq!(end, record.implementation_end.expect("end"));
}

#[test]
fn window_defaults_one_day_out() {
    let record = cic_record();
    let (start, end) = meeting_window(&record, now());
    assert_eq!(start.to_rfc3339(), "2025-10-21T02:00:00Z");
    assert_eq!(end.to_rfc3339(), "2025-10-21T02:30:00Z");
}

#[test]
fn recording_client_round_trips_schedule_and_cancel() {
    let client = RecordingMeetingClient::new();
    let request = MeetingRequest {
        subject: "CIC Event: Quarterly Update".to_string(),
        body: "Agenda".to_string(),
        start_time: now(),
        end_time: now(),
        organizer: "ccoe@example.com".to_string(),
        attendees: vec!["cic-announce".to_string()],
    };
    let metadata = client.schedule(&request).expect("schedule");
    assert_eq!(metadata.subject, request.subject);
    assert!(!metadata.meeting_id.is_empty());
    assert!(metadata.join_url.contains(&metadata.meeting_id));
    client.cancel(&metadata.meeting_id).expect("cancel");
    assert_eq!(client.scheduled().len(), 1);
    assert_eq!(client.cancelled(), vec![metadata.meeting_id]);
}

#[test]
fn recording_client_can_simulate_outage() {
    let client = RecordingMeetingClient::new();
    client.fail_next_schedules();
    let request = MeetingRequest {
        subject: "Change Event: Security Baseline".to_string(),
        body: String::new(),
        start_time: now(),
        end_time: now(),
        organizer: "ccoe@example.com".to_string(),
        attendees: Vec::new(),
    };
    assert!(matches!(client.schedule(&request), Err(MeetingError::Service(_))));
}

#[test]
fn http_client_rejects_empty_base_url() {
    assert!(matches!(HttpMeetingClient::new("  ", "token"), Err(MeetingError::Invalid(_))));
}
