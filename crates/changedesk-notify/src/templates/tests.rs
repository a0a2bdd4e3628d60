#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use changedesk_core::AnnouncementId;
use changedesk_core::Attachment;
use changedesk_core::ChangeId;
use changedesk_core::CustomerCode;
use changedesk_core::MeetingMetadata;
use changedesk_core::UserEmail;
use changedesk_core::UtcTimestamp;

use super::*;

fn now() -> UtcTimestamp {
    UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("parse")
}

fn change_record() -> ObjectRecord {
    let mut record = ObjectRecord::new_change(
        ChangeId::generate(now()),
        "Security Baseline",
        vec![CustomerCode::parse("hts").expect("code")],
        UserEmail::parse("alice@example.com").expect("email"),
        now(),
    );
    record.description = Some("Roll out the hardened baseline".to_string());
    record
}

fn cic_record() -> ObjectRecord {
    let mut record = ObjectRecord::new_announcement(
        AnnouncementSubtype::Cic,
        AnnouncementId::parse("CIC-2025-001").expect("id"),
        "Quarterly Update",
        vec![CustomerCode::parse("hts").expect("code")],
        UserEmail::parse("alice@example.com").expect("email"),
        now(),
    );
    record.summary = Some("Platform updates for Q4".to_string());
    record.content = Some("Everything you need to know".to_string());
    record
}

#[test]
fn themes_match_the_subtype_table() {
    assert_eq!(theme_for(ObjectType::Change).color, "#6b7280");
    assert_eq!(theme_for(ObjectType::Announcement(AnnouncementSubtype::Cic)).color, "#2563eb");
    assert_eq!(theme_for(ObjectType::Announcement(AnnouncementSubtype::Finops)).color, "#16a34a");
    assert_eq!(
        theme_for(ObjectType::Announcement(AnnouncementSubtype::Innersource)).color,
        "#7c3aed"
    );
    assert_eq!(theme_for(ObjectType::Announcement(AnnouncementSubtype::General)).color, "#0ea5e9");
}

#[test]
fn render_produces_both_variants_with_title() {
    let message = render(&change_record(), EmailKind::ApprovalRequest);
    assert!(message.subject.contains("Security Baseline"));
    assert!(message.subject.contains("Approval required"));
    assert!(message.html.contains("Security Baseline"));
    assert!(message.text.contains("Security Baseline"));
    assert!(message.html.contains("#6b7280"), "change emails use the gray theme");
    assert!(message.text.contains("awaiting approval"));
}

#[test]
fn cic_render_uses_blue_theme_and_content_block() {
    let message = render(&cic_record(), EmailKind::Approved);
    assert!(message.html.contains("#2563eb"), "cic emails use the blue theme");
    assert!(message.subject.starts_with("CIC Announcement"));
    assert!(message.html.contains("Platform updates for Q4"));
    assert!(message.html.contains("Everything you need to know"));
    assert!(message.text.contains("Everything you need to know"));
}

#[test]
fn meeting_block_renders_only_when_scheduled() {
    let mut record = cic_record();
    let without = render(&record, EmailKind::Approved);
    assert!(!without.html.contains("Join the meeting"));
    record.meeting_metadata = Some(MeetingMetadata {
        meeting_id: "meet-1".to_string(),
        join_url: "https://meet.example.com/meet-1".to_string(),
        start_time: now(),
        end_time: now(),
        subject: "CIC Event: Quarterly Update".to_string(),
        organizer: "ccoe@example.com".to_string(),
    });
    let with = render(&record, EmailKind::Approved);
    assert!(with.html.contains("Join the meeting"));
    assert!(with.html.contains("https://meet.example.com/meet-1"));
    assert!(with.text.contains("https://meet.example.com/meet-1"));
}

#[test]
fn attachments_render_with_humanized_sizes() {
    let mut record = change_record();
    record.attachments.push(Attachment {
        name: "runbook.pdf".to_string(),
        store_key: "attachments/runbook.pdf".to_string(),
        size: 2048,
        uploaded_at: now(),
    });
    let message = render(&record, EmailKind::Completed);
    assert!(message.html.contains("runbook.pdf"));
    assert!(message.html.contains("2.0 KB"));
    assert!(message.text.contains("runbook.pdf"));
}

#[test]
fn html_content_is_escaped() {
    let mut record = change_record();
    record.title = "Baseline <script>alert(1)</script>".to_string();
    let message = render(&record, EmailKind::Approved);
    assert!(!message.html.contains("<script>"));
    assert!(message.html.contains("&lt;script&gt;"));
}

#[test]
fn size_formatting_covers_units() {
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(2048), "2.0 KB");
    assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
}
