#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use serde::Deserialize;

use super::*;
use crate::object_store::MemoryObjectStore;

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Doc {
    name: String,
    count: u32,
}

fn gateway() -> ObjectGateway {
    ObjectGateway::new(Arc::new(MemoryObjectStore::new("unit-bucket")))
}

fn deleter() -> UserEmail {
    UserEmail::parse("alice@example.com").expect("email")
}

#[test]
fn json_round_trip_preserves_value_and_pretty_prints() {
    let gateway = gateway();
    let doc = Doc {
        name: "baseline".to_string(),
        count: 2,
    };
    gateway
        .put_json("archive/doc.json", &doc, &BTreeMap::new(), PutCondition::Overwrite)
        .expect("put");
    let (loaded, etag) = gateway.get_json::<Doc>("archive/doc.json").expect("get");
    assert_eq!(loaded, doc);
    assert!(!etag.as_str().is_empty());
    let raw = gateway.store().get("archive/doc.json").expect("raw");
    let rendered = String::from_utf8(raw.bytes).expect("utf8");
    assert!(rendered.contains("\n  \"name\""), "payload must be pretty-printed: {rendered}");
}

#[test]
fn decode_failure_names_the_key() {
    let gateway = gateway();
    gateway
        .store()
        .put(
            "archive/bad.json",
            b"not json".to_vec(),
            None,
            &BTreeMap::new(),
            PutCondition::Overwrite,
        )
        .expect("seed");
    let error = gateway.get_json::<Doc>("archive/bad.json").expect_err("decode");
    match error {
        GatewayError::Decode {
            key, ..
        } => assert_eq!(key, "archive/bad.json"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_key_surfaces_store_not_found() {
    let gateway = gateway();
    let error = gateway.get_json::<Doc>("archive/absent.json").expect_err("missing");
    assert!(matches!(error, GatewayError::Store(StoreError::NotFound { .. })));
}

#[test]
fn conditional_put_propagates_etag_mismatch() {
    let gateway = gateway();
    let doc = Doc {
        name: "baseline".to_string(),
        count: 1,
    };
    gateway
        .put_json("archive/doc.json", &doc, &BTreeMap::new(), PutCondition::IfNoneMatch)
        .expect("create");
    let error = gateway
        .put_json("archive/doc.json", &doc, &BTreeMap::new(), PutCondition::IfNoneMatch)
        .expect_err("duplicate create");
    assert!(matches!(error, GatewayError::Store(StoreError::ETagMismatch { .. })));
}

#[test]
fn tombstone_move_decorates_payload_and_removes_original() {
    let gateway = gateway();
    let doc = Doc {
        name: "draft".to_string(),
        count: 7,
    };
    gateway
        .put_json("drafts/CHG-1.json", &doc, &BTreeMap::new(), PutCondition::Overwrite)
        .expect("seed");
    let now = UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("ts");
    let target = gateway
        .tombstone_move("drafts/CHG-1.json", &deleter(), "superseded", now)
        .expect("move");
    assert_eq!(target, "deleted/drafts/CHG-1.json");
    assert!(!gateway.exists("drafts/CHG-1.json").expect("exists"));
    let (payload, _) = gateway.get_json::<Value>(&target).expect("tombstone");
    assert_eq!(payload["name"], "draft");
    assert_eq!(payload["deleted_by"], "alice@example.com");
    assert_eq!(payload["deleted_at"], "2025-10-20T02:00:00Z");
    assert_eq!(payload["deletion_reason"], "superseded");
    assert_eq!(payload["original_path"], "drafts/CHG-1.json");
}

#[test]
fn tombstone_move_retry_overwrites_stale_target() {
    let gateway = gateway();
    let doc = Doc {
        name: "draft".to_string(),
        count: 7,
    };
    gateway
        .put_json("drafts/CHG-1.json", &doc, &BTreeMap::new(), PutCondition::Overwrite)
        .expect("seed");
    // Simulate a crashed first attempt that copied but never deleted.
    gateway
        .put_json(
            "deleted/drafts/CHG-1.json",
            &doc,
            &BTreeMap::new(),
            PutCondition::Overwrite,
        )
        .expect("stale tombstone");
    let now = UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("ts");
    gateway.tombstone_move("drafts/CHG-1.json", &deleter(), "superseded", now).expect("retry");
    assert!(!gateway.exists("drafts/CHG-1.json").expect("exists"));
    let (payload, _) = gateway.get_json::<Value>("deleted/drafts/CHG-1.json").expect("tombstone");
    assert_eq!(payload["deletion_reason"], "superseded");
}

#[test]
fn replace_metadata_copies_to_self() {
    let gateway = gateway();
    let doc = Doc {
        name: "baseline".to_string(),
        count: 1,
    };
    let mut original = BTreeMap::new();
    original.insert("status".to_string(), "completed".to_string());
    gateway
        .put_json("archive/doc.json", &doc, &original, PutCondition::Overwrite)
        .expect("seed");
    let mut replacement = original.clone();
    replacement.insert("survey-id".to_string(), "form9".to_string());
    gateway.replace_metadata("archive/doc.json", &replacement).expect("replace");
    let raw = gateway.store().get("archive/doc.json").expect("raw");
    assert_eq!(raw.metadata, replacement);
    let (loaded, _) = gateway.get_json::<Doc>("archive/doc.json").expect("get");
    assert_eq!(loaded, doc);
}
