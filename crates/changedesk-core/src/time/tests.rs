#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use super::*;

#[test]
fn parse_and_render_round_trip() {
    let stamp = UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("parse");
    assert_eq!(stamp.to_rfc3339(), "2025-10-20T02:00:00Z");
}

#[test]
fn parse_normalizes_offsets_to_utc() {
    let stamp = UtcTimestamp::parse("2025-10-20T04:00:00+02:00").expect("parse");
    assert_eq!(stamp.to_rfc3339(), "2025-10-20T02:00:00Z");
}

#[test]
fn parse_rejects_garbage() {
    assert!(UtcTimestamp::parse("not-a-date").is_err());
    assert!(UtcTimestamp::parse("2025-13-01T00:00:00Z").is_err());
}

#[test]
fn key_form_replaces_colons() {
    let stamp = UtcTimestamp::parse("2025-10-20T02:15:30Z").expect("parse");
    assert_eq!(stamp.to_key_form(), "2025-10-20T02-15-30");
}

#[test]
fn quarter_covers_all_months() {
    let cases = [
        ("2025-01-15T00:00:00Z", 1),
        ("2025-04-01T00:00:00Z", 2),
        ("2025-09-30T23:59:59Z", 3),
        ("2025-12-31T00:00:00Z", 4),
    ];
    for (raw, expected) in cases {
        let stamp = UtcTimestamp::parse(raw).expect("parse");
        assert_eq!(stamp.quarter(), expected, "{raw}");
    }
}

#[test]
fn serde_round_trip_preserves_wire_form() {
    let stamp = UtcTimestamp::parse("2025-06-01T12:00:00Z").expect("parse");
    let encoded = serde_json::to_string(&stamp).expect("encode");
    assert_eq!(encoded, "\"2025-06-01T12:00:00Z\"");
    let decoded: UtcTimestamp = serde_json::from_str(&encoded).expect("decode");
    assert_eq!(decoded, stamp);
}

#[test]
fn ordering_follows_instants() {
    let earlier = UtcTimestamp::parse("2025-01-01T00:00:00Z").expect("parse");
    let later = UtcTimestamp::parse("2025-01-01T00:00:01Z").expect("parse");
    assert!(earlier < later);
}
