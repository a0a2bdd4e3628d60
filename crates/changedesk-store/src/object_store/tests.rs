#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::sync::Barrier;

use super::*;

fn no_metadata() -> BTreeMap<String, String> {
    BTreeMap::new()
}

#[test]
fn put_and_get_round_trip_with_metadata() {
    let store = MemoryObjectStore::new("unit-bucket");
    let mut metadata = BTreeMap::new();
    metadata.insert("request-type".to_string(), "approval_request".to_string());
    let etag = store
        .put(
            "archive/CHG-1.json",
            b"{\"ok\":true}".to_vec(),
            Some("application/json"),
            &metadata,
            PutCondition::Overwrite,
        )
        .expect("put");
    let stored = store.get("archive/CHG-1.json").expect("get");
    assert_eq!(stored.bytes, b"{\"ok\":true}");
    assert_eq!(stored.etag, etag);
    assert_eq!(stored.metadata.get("request-type").map(String::as_str), Some("approval_request"));
}

#[test]
fn get_missing_key_is_not_found() {
    let store = MemoryObjectStore::new("unit-bucket");
    let error = store.get("archive/absent.json").expect_err("missing");
    assert!(matches!(error, StoreError::NotFound { .. }));
}

#[test]
fn create_only_put_rejects_existing_key() {
    let store = MemoryObjectStore::new("unit-bucket");
    store
        .put("archive/CHG-1.json", b"v1".to_vec(), None, &no_metadata(), PutCondition::IfNoneMatch)
        .expect("first create");
    let error = store
        .put("archive/CHG-1.json", b"v2".to_vec(), None, &no_metadata(), PutCondition::IfNoneMatch)
        .expect_err("second create");
    match error {
        StoreError::ETagMismatch {
            expected, key, ..
        } => {
            assert_eq!(expected, "*");
            assert_eq!(key, "archive/CHG-1.json");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn if_match_put_requires_current_etag() {
    let store = MemoryObjectStore::new("unit-bucket");
    let first = store
        .put("archive/CHG-1.json", b"v1".to_vec(), None, &no_metadata(), PutCondition::Overwrite)
        .expect("seed");
    let second = store
        .put(
            "archive/CHG-1.json",
            b"v2".to_vec(),
            None,
            &no_metadata(),
            PutCondition::IfMatch(first.clone()),
        )
        .expect("conditional replace");
    assert_ne!(first, second);
    let error = store
        .put(
            "archive/CHG-1.json",
            b"v3".to_vec(),
            None,
            &no_metadata(),
            PutCondition::IfMatch(first),
        )
        .expect_err("stale etag");
    assert!(matches!(error, StoreError::ETagMismatch { .. }));
    let stored = store.get("archive/CHG-1.json").expect("get");
    assert_eq!(stored.bytes, b"v2");
}

#[test]
fn concurrent_if_match_writers_admit_exactly_one() {
    let store = Arc::new(MemoryObjectStore::new("unit-bucket"));
    let seed = store
        .put("archive/CHG-1.json", b"v1".to_vec(), None, &no_metadata(), PutCondition::Overwrite)
        .expect("seed");
    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for writer in 0 .. 2u8 {
        let store = Arc::clone(&store);
        let seed = seed.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            store.put(
                "archive/CHG-1.json",
                vec![writer],
                None,
                &BTreeMap::new(),
                PutCondition::IfMatch(seed),
            )
        }));
    }
    let outcomes: Vec<Result<ETag, StoreError>> =
        handles.into_iter().map(|handle| handle.join().expect("join")).collect();
    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1, "exactly one conditional writer must win");
    assert!(
        outcomes
            .iter()
            .any(|outcome| matches!(outcome, Err(StoreError::ETagMismatch { .. }))),
        "the loser must observe an etag mismatch"
    );
}

#[test]
fn head_reports_presence_and_size() {
    let store = MemoryObjectStore::new("unit-bucket");
    assert!(store.head("archive/CHG-1.json").expect("head").is_none());
    store
        .put("archive/CHG-1.json", b"12345".to_vec(), None, &no_metadata(), PutCondition::Overwrite)
        .expect("put");
    let meta = store.head("archive/CHG-1.json").expect("head").expect("present");
    assert_eq!(meta.size, 5);
}

#[test]
fn list_filters_by_prefix_in_key_order() {
    let store = MemoryObjectStore::new("unit-bucket");
    for key in ["archive/b.json", "archive/a.json", "drafts/c.json"] {
        store
            .put(key, b"{}".to_vec(), None, &no_metadata(), PutCondition::Overwrite)
            .expect("put");
    }
    let archived = store.list("archive/").expect("list");
    let keys: Vec<&str> = archived.iter().map(|meta| meta.key.as_str()).collect();
    assert_eq!(keys, vec!["archive/a.json", "archive/b.json"]);
}

#[test]
fn copy_replaces_metadata_when_requested() {
    let store = MemoryObjectStore::new("unit-bucket");
    let mut original = BTreeMap::new();
    original.insert("status".to_string(), "approved".to_string());
    store
        .put("archive/CHG-1.json", b"{}".to_vec(), None, &original, PutCondition::Overwrite)
        .expect("put");
    let mut replacement = BTreeMap::new();
    replacement.insert("survey-id".to_string(), "form9".to_string());
    store
        .copy("archive/CHG-1.json", "archive/CHG-1.json", Some(&replacement))
        .expect("copy to self");
    let stored = store.get("archive/CHG-1.json").expect("get");
    assert_eq!(stored.metadata, replacement);

    store.copy("archive/CHG-1.json", "archive/CHG-2.json", None).expect("copy");
    let copied = store.get("archive/CHG-2.json").expect("get");
    assert_eq!(copied.metadata, replacement);
}

#[test]
fn delete_is_idempotent() {
    let store = MemoryObjectStore::new("unit-bucket");
    store
        .put("drafts/CHG-1.json", b"{}".to_vec(), None, &no_metadata(), PutCondition::Overwrite)
        .expect("put");
    store.delete("drafts/CHG-1.json").expect("delete");
    store.delete("drafts/CHG-1.json").expect("repeat delete");
    assert!(store.head("drafts/CHG-1.json").expect("head").is_none());
}

#[test]
fn etag_trims_quote_framing() {
    assert_eq!(ETag::new("\"abc123\"").as_str(), "abc123");
    assert_eq!(ETag::new("abc123").as_str(), "abc123");
}
