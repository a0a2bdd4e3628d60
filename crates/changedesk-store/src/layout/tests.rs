#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use super::*;

fn customer() -> CustomerCode {
    CustomerCode::parse("hts").expect("code")
}

#[test]
fn key_builders_compose_expected_paths() {
    assert_eq!(
        archive_key("CHG-2025-10-20T02-00-00-abc123").expect("key"),
        "archive/CHG-2025-10-20T02-00-00-abc123.json"
    );
    assert_eq!(
        customer_key(&customer(), "CIC-2025-001").expect("key"),
        "customers/hts/CIC-2025-001.json"
    );
    assert_eq!(draft_key("CHG-x1").expect("key"), "drafts/CHG-x1.json");
    assert_eq!(version_key("CHG-x1", 3).expect("key"), "versions/CHG-x1/v3.json");
    assert_eq!(versions_prefix("CHG-x1").expect("prefix"), "versions/CHG-x1/");
    assert_eq!(deleted_key("drafts/CHG-x1.json"), "deleted/drafts/CHG-x1.json");
}

#[test]
fn survey_keys_embed_customer_and_period() {
    let form = survey_form_key(&customer(), "CHG-x1", "2025-10-20T02-00-00", "form9")
        .expect("form key");
    assert_eq!(form, "surveys/forms/hts/CHG-x1/2025-10-20T02-00-00-form9.json");
    let result = survey_result_key(&customer(), 2025, 4, "2025-10-20T02-00-00", "form9")
        .expect("result key");
    assert_eq!(result, "surveys/results/hts/2025/4/2025-10-20T02-00-00-form9.json");
}

#[test]
fn segments_fail_closed() {
    assert!(validate_segment("").is_err());
    assert!(validate_segment("..").is_err());
    assert!(validate_segment("a/b").is_err());
    assert!(validate_segment("a\\b").is_err());
    assert!(validate_segment("a..b").is_err());
    assert!(validate_segment(&"x".repeat(300)).is_err());
    assert!(archive_key("../escape").is_err());
    assert!(version_key("a/b", 1).is_err());
}

#[test]
fn request_type_labels_round_trip() {
    let labels = [
        (RequestType::ApprovalRequest, "approval_request"),
        (RequestType::AnnouncementApprovalRequest, "announcement_approval_request"),
        (RequestType::ApprovedChange, "approved_change"),
        (RequestType::ApprovedAnnouncement, "approved_announcement"),
        (RequestType::ChangeCancelled, "change_cancelled"),
        (RequestType::ChangeComplete, "change_complete"),
        (RequestType::AnnouncementCancelled, "announcement_cancelled"),
        (RequestType::AnnouncementCompleted, "announcement_completed"),
        (RequestType::AnnouncementUpdate, "announcement_update"),
    ];
    for (value, label) in labels {
        assert_eq!(value.as_str(), label);
        assert_eq!(RequestType::from_label(label), Some(value));
    }
    assert_eq!(RequestType::from_label("unknown"), None);
}

#[test]
fn transitions_map_to_one_hint_per_kind() {
    assert_eq!(
        RequestType::for_transition(ObjectKind::Change, ObjectStatus::Approved),
        Some(RequestType::ApprovedChange)
    );
    assert_eq!(
        RequestType::for_transition(ObjectKind::Announcement, ObjectStatus::Approved),
        Some(RequestType::ApprovedAnnouncement)
    );
    assert_eq!(RequestType::for_transition(ObjectKind::Change, ObjectStatus::Draft), None);
    assert_eq!(RequestType::for_transition(ObjectKind::Announcement, ObjectStatus::Draft), None);
}
