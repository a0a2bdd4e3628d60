#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::sync::Arc;

use changedesk_store::MemoryObjectStore;
use changedesk_store::ObjectStore;
use serde_json::json;

use super::*;

const SECRET: &str = "wh-secret-123";

fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("mac");
    mac.update(payload);
    format!("sha256={}", BASE64.encode(mac.finalize().into_bytes()))
}

fn sample_payload() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event_type": "form_response",
        "form_response": {
            "form_id": "form9",
            "hidden": { "customer_code": "hts" },
            "answers": [{ "type": "boolean", "boolean": true }],
        },
    }))
    .expect("encode")
}

fn harness() -> (WebhookIngest, Arc<MemoryObjectStore>) {
    let store = Arc::new(MemoryObjectStore::new("unit-bucket"));
    let gateway = ObjectGateway::new(Arc::clone(&store) as Arc<dyn ObjectStore>);
    (WebhookIngest::new(gateway, SECRET), store)
}

fn now() -> UtcTimestamp {
    UtcTimestamp::parse("2025-10-20T02:00:00Z").expect("parse")
}

#[test]
fn valid_signature_verifies() {
    let payload = sample_payload();
    let signature = sign(SECRET, &payload);
    assert!(verify_signature(SECRET, &payload, &signature));
}

#[test]
fn any_payload_byte_flip_rejects() {
    let payload = sample_payload();
    let signature = sign(SECRET, &payload);
    for index in 0 .. payload.len() {
        let mut mutated = payload.clone();
        mutated[index] ^= 0x01;
        assert!(
            !verify_signature(SECRET, &mutated, &signature),
            "byte {index} flip must invalidate the signature"
        );
    }
}

#[test]
fn any_signature_mutation_rejects() {
    let payload = sample_payload();
    let signature = sign(SECRET, &payload);
    let raw = signature.strip_prefix("sha256=").expect("prefix");
    let digest = BASE64.decode(raw).expect("decode");
    for index in 0 .. digest.len() {
        let mut mutated = digest.clone();
        mutated[index] ^= 0x01;
        let forged = format!("sha256={}", BASE64.encode(&mutated));
        assert!(
            !verify_signature(SECRET, &payload, &forged),
            "digest byte {index} flip must be rejected"
        );
    }
}

#[test]
fn malformed_signature_shapes_reject() {
    let payload = sample_payload();
    assert!(!verify_signature(SECRET, &payload, ""));
    assert!(!verify_signature(SECRET, &payload, "sha256="));
    assert!(!verify_signature(SECRET, &payload, "md5=abcd"));
    assert!(!verify_signature(SECRET, &payload, "sha256=!!not-base64!!"));
}

#[test]
fn wrong_secret_rejects() {
    let payload = sample_payload();
    let signature = sign("other-secret", &payload);
    assert!(!verify_signature(SECRET, &payload, &signature));
}

#[test]
fn ingest_persists_under_customer_and_quarter() {
    let (ingest, store) = harness();
    let payload = sample_payload();
    let signature = sign(SECRET, &payload);
    let key = ingest.ingest(&payload, &signature, now()).expect("ingest");
    assert_eq!(key, "surveys/results/hts/2025/4/2025-10-20T02-00-00-form9.json");
    let stored = store.get(&key).expect("stored");
    let parsed: Value = serde_json::from_slice(&stored.bytes).expect("decode");
    assert_eq!(parsed["form_response"]["form_id"], "form9");
}

#[test]
fn ingest_rejects_bad_signature_without_writing() {
    let (ingest, store) = harness();
    let payload = sample_payload();
    let error = ingest.ingest(&payload, "sha256=AAAA", now()).expect_err("reject");
    assert!(matches!(error, WebhookError::InvalidSignature));
    assert!(store.list("surveys/").expect("list").is_empty());
}

#[test]
fn ingest_rejects_non_json_payloads() {
    let (ingest, _store) = harness();
    let payload = b"not json at all".to_vec();
    let signature = sign(SECRET, &payload);
    let error = ingest.ingest(&payload, &signature, now()).expect_err("reject");
    assert!(matches!(error, WebhookError::Malformed(_)));
}

#[test]
fn ingest_files_unknown_customers_separately() {
    let (ingest, _store) = harness();
    let payload = serde_json::to_vec(&json!({
        "form_response": { "form_id": "form9" },
    }))
    .expect("encode");
    let signature = sign(SECRET, &payload);
    let key = ingest.ingest(&payload, &signature, now()).expect("ingest");
    assert!(key.starts_with("surveys/results/unknown/"));
}
