#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use super::*;
use crate::identifiers::AnnouncementId;
use crate::identifiers::ChangeId;
use crate::identifiers::CustomerCode;
use crate::identifiers::UserEmail;
use crate::object::AnnouncementSubtype;
use crate::time::UtcTimestamp;

fn now() -> UtcTimestamp {
    UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("parse")
}

fn valid_change() -> ObjectRecord {
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

fn valid_announcement() -> ObjectRecord {
    let mut record = ObjectRecord::new_announcement(
        AnnouncementSubtype::Cic,
        AnnouncementId::parse("CIC-2025-001").expect("id"),
        "Quarterly Update",
        vec![CustomerCode::parse("hts").expect("code")],
        UserEmail::parse("alice@example.com").expect("email"),
        now(),
    );
    record.summary = Some("The quarterly platform update".to_string());
    record
}

#[test]
fn valid_records_pass() {
    assert_eq!(validate_record(&valid_change()), Ok(()));
    assert_eq!(validate_record(&valid_announcement()), Ok(()));
}

#[test]
fn empty_title_is_rejected() {
    let mut record = valid_change();
    record.title = "   ".to_string();
    assert_eq!(validate_record(&record), Err(ValidationError::MissingField("title")));
}

#[test]
fn empty_customer_list_is_rejected() {
    let mut record = valid_change();
    record.customers.clear();
    assert_eq!(validate_record(&record), Err(ValidationError::MissingField("customers")));
}

#[test]
fn change_requires_description() {
    let mut record = valid_change();
    record.description = None;
    assert_eq!(validate_record(&record), Err(ValidationError::MissingField("description")));
}

#[test]
fn change_rejects_inverted_window() {
    let mut record = valid_change();
    record.implementation_start = Some(UtcTimestamp::parse("2025-10-20T04:00:00Z").expect("ts"));
    record.implementation_end = Some(UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("ts"));
    assert!(matches!(
        validate_record(&record),
        Err(ValidationError::InvalidField {
            field: "implementation_end",
            ..
        })
    ));
}

#[test]
fn announcement_requires_summary() {
    let mut record = valid_announcement();
    record.summary = None;
    assert_eq!(validate_record(&record), Err(ValidationError::MissingField("summary")));
}

#[test]
fn kinds_never_carry_the_other_identifier() {
    let mut change = valid_change();
    change.announcement_id = Some(AnnouncementId::parse("GEN-2025-001").expect("id"));
    assert!(validate_record(&change).is_err());

    let mut announcement = valid_announcement();
    announcement.change_id = Some(ChangeId::generate(now()));
    assert!(validate_record(&announcement).is_err());
}

#[test]
fn announcement_id_prefix_must_match_subtype() {
    let mut record = valid_announcement();
    record.announcement_id = Some(AnnouncementId::parse("FIN-2025-001").expect("id"));
    assert!(matches!(
        validate_record(&record),
        Err(ValidationError::InvalidField {
            field: "announcement_id",
            ..
        })
    ));
}
