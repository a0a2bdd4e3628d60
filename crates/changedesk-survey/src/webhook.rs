// crates/changedesk-survey/src/webhook.rs
// ============================================================================
// Module: Survey Webhook Ingest
// Description: HMAC-verified ingestion of survey responses.
// Purpose: Persist authentic webhook payloads under the results prefix.
// Dependencies: changedesk-store, hmac, sha2, subtle, base64
// ============================================================================

//! ## Overview
//! The survey service signs webhook deliveries with HMAC-SHA256 over the raw
//! body, transmitted as `sha256=<base64 digest>`. Verification recomputes the
//! digest with the shared secret and compares in constant time; any
//! single-byte mutation of payload or signature rejects the request.
//! Accepted payloads persist under
//! `surveys/results/<customer>/<year>/<quarter>/` with a bounded exponential
//! backoff on store writes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use changedesk_core::CustomerCode;
use changedesk_core::UtcTimestamp;
use changedesk_store::GatewayError;
use changedesk_store::ObjectGateway;
use changedesk_store::PutCondition;
use changedesk_store::survey_result_key;
use hmac::Hmac;
use hmac::Mac;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Signature header scheme prefix.
const SIGNATURE_PREFIX: &str = "sha256=";
/// Base delay before the first store-write retry.
const STORE_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
/// Maximum store-write attempts.
const MAX_STORE_ATTEMPTS: u32 = 3;
/// Customer code recorded when the payload carries none.
const UNKNOWN_CUSTOMER: &str = "unknown";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Webhook ingest errors.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature missing or failed verification.
    #[error("webhook signature invalid")]
    InvalidSignature,
    /// Payload is not the expected JSON shape.
    #[error("webhook payload malformed: {0}")]
    Malformed(String),
    /// Store writes failed on every attempt.
    #[error("webhook store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Signature Verification
// ============================================================================

/// Verifies an HMAC-SHA256 webhook signature in constant time.
///
/// The signature is `sha256=<base64 digest>` over the raw payload bytes.
#[must_use]
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(encoded) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(provided) = BASE64.decode(encoded.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let expected = mac.finalize().into_bytes();
    expected.as_slice().ct_eq(provided.as_slice()).into()
}

// ============================================================================
// SECTION: Ingest
// ============================================================================

/// HMAC-verified webhook ingest endpoint logic.
pub struct WebhookIngest {
    /// Store gateway for result persistence.
    gateway: ObjectGateway,
    /// Shared webhook secret.
    secret: String,
}

impl WebhookIngest {
    /// Creates an ingest handler.
    #[must_use]
    pub fn new(gateway: ObjectGateway, secret: impl Into<String>) -> Self {
        Self {
            gateway,
            secret: secret.into(),
        }
    }

    /// Validates and persists one webhook delivery.
    ///
    /// Returns the store key the payload was persisted under.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidSignature`] on verification failure,
    /// [`WebhookError::Malformed`] for non-JSON payloads, and
    /// [`WebhookError::Store`] when persistence fails after every attempt.
    pub fn ingest(
        &self,
        payload: &[u8],
        signature: &str,
        now: UtcTimestamp,
    ) -> Result<String, WebhookError> {
        if !verify_signature(&self.secret, payload, signature) {
            return Err(WebhookError::InvalidSignature);
        }
        let parsed: Value = serde_json::from_slice(payload)
            .map_err(|err| WebhookError::Malformed(err.to_string()))?;
        let form_id = parsed
            .pointer("/form_response/form_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown-form")
            .to_string();
        let customer = parsed
            .pointer("/form_response/hidden/customer_code")
            .and_then(Value::as_str)
            .and_then(|code| CustomerCode::parse(code).ok());
        let customer = match customer {
            Some(code) => code,
            None => CustomerCode::parse(UNKNOWN_CUSTOMER)
                .map_err(|err| WebhookError::Malformed(err.to_string()))?,
        };
        let key = survey_result_key(&customer, now.year(), now.quarter(), &now.to_key_form(), &form_id)
            .map_err(|err| WebhookError::Store(err.to_string()))?;
        self.put_with_backoff(&key, &parsed)?;
        Ok(key)
    }

    /// Writes the payload with bounded exponential backoff.
    fn put_with_backoff(&self, key: &str, payload: &Value) -> Result<(), WebhookError> {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            match self.gateway.put_json(key, payload, &BTreeMap::new(), PutCondition::Overwrite) {
                Ok(_) => return Ok(()),
                Err(GatewayError::Store(_)) if attempt < MAX_STORE_ATTEMPTS => {
                    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                    thread::sleep(STORE_RETRY_BASE_DELAY.saturating_mul(factor));
                }
                Err(err) => return Err(WebhookError::Store(err.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests;
