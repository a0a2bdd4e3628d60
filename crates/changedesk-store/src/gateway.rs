// crates/changedesk-store/src/gateway.rs
// ============================================================================
// Module: Typed Object Gateway
// Description: JSON-typed reads and writes over the raw object store.
// Purpose: Round-trip records without interpreting them, and move tombstones.
// Dependencies: crate::{layout, object_store}, serde_json
// ============================================================================

//! ## Overview
//! The gateway decodes store bytes into caller-supplied types and
//! pretty-prints on write (2-space indent) so stored records stay
//! hand-readable. It adds no record semantics of its own. The one composite
//! operation it owns is the tombstone move: read the original, write it under
//! `deleted/` with deletion metadata merged into the payload, then delete the
//! original. A crash between the copy and the delete leaves both objects;
//! the retry overwrites the tombstone idempotently and finishes the delete.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use changedesk_core::UserEmail;
use changedesk_core::UtcTimestamp;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::layout::deleted_key;
use crate::object_store::ETag;
use crate::object_store::ObjectMeta;
use crate::object_store::ObjectStore;
use crate::object_store::PutCondition;
use crate::object_store::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type stamped on every JSON write.
const JSON_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Typed gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Stored bytes did not decode into the requested type.
    #[error("decode failure at {key}: {message}")]
    Decode {
        /// Object key.
        key: String,
        /// Decoder message.
        message: String,
    },
    /// Value failed to encode as JSON.
    #[error("encode failure: {0}")]
    Encode(String),
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// JSON-typed gateway over an object store.
#[derive(Clone)]
pub struct ObjectGateway {
    /// Underlying store implementation.
    store: Arc<dyn ObjectStore>,
}

impl ObjectGateway {
    /// Wraps a store implementation.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Returns the bucket the gateway writes into.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    /// Reads and decodes a JSON object, returning it with its ETag.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] for store failures (including
    /// [`StoreError::NotFound`]) and [`GatewayError::Decode`] for malformed
    /// payloads.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<(T, ETag), GatewayError> {
        let stored = self.store.get(key)?;
        let value = serde_json::from_slice(&stored.bytes).map_err(|err| GatewayError::Decode {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        Ok((value, stored.etag))
    }

    /// Reads a JSON object together with its user metadata.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::get_json`].
    pub fn get_json_with_metadata<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<(T, ETag, BTreeMap<String, String>), GatewayError> {
        let stored = self.store.get(key)?;
        let value = serde_json::from_slice(&stored.bytes).map_err(|err| GatewayError::Decode {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        Ok((value, stored.etag, stored.metadata))
    }

    /// Encodes and writes a JSON object under the given precondition.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Encode`] when the value does not serialize and
    /// [`GatewayError::Store`] for store failures, including
    /// [`StoreError::ETagMismatch`] on a failed precondition.
    pub fn put_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        metadata: &BTreeMap<String, String>,
        condition: PutCondition,
    ) -> Result<ETag, GatewayError> {
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|err| GatewayError::Encode(err.to_string()))?;
        let etag = self.store.put(key, bytes, Some(JSON_CONTENT_TYPE), metadata, condition)?;
        Ok(etag)
    }

    /// Returns true when the key currently exists.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on backend failure.
    pub fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        Ok(self.store.head(key)?.is_some())
    }

    /// Lists objects under a prefix.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on backend failure.
    pub fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, GatewayError> {
        Ok(self.store.list(prefix)?)
    }

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on backend failure.
    pub fn delete(&self, key: &str) -> Result<(), GatewayError> {
        Ok(self.store.delete(key)?)
    }

    /// Copies an object to itself, replacing its user metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on backend failure.
    pub fn replace_metadata(
        &self,
        key: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), GatewayError> {
        Ok(self.store.copy(key, key, Some(metadata))?)
    }

    /// Moves an object to the deleted prefix with deletion metadata.
    ///
    /// The tombstone payload is the original JSON with `deleted_by`,
    /// `deleted_at`, `deletion_reason`, and `original_path` merged in.
    /// Duplicate puts under the tombstone key are idempotent overwrites, so a
    /// retry after a partial failure converges.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] when the original is absent or a store
    /// call fails, and [`GatewayError::Decode`] when the original is not a
    /// JSON document.
    pub fn tombstone_move(
        &self,
        key: &str,
        deleted_by: &UserEmail,
        reason: &str,
        now: UtcTimestamp,
    ) -> Result<String, GatewayError> {
        let stored = self.store.get(key)?;
        let mut payload: Value =
            serde_json::from_slice(&stored.bytes).map_err(|err| GatewayError::Decode {
                key: key.to_string(),
                message: err.to_string(),
            })?;
        if let Value::Object(fields) = &mut payload {
            fields.insert("deleted_by".to_string(), Value::String(deleted_by.to_string()));
            fields.insert("deleted_at".to_string(), Value::String(now.to_rfc3339()));
            fields.insert("deletion_reason".to_string(), Value::String(reason.to_string()));
            fields.insert("original_path".to_string(), Value::String(key.to_string()));
        } else {
            return Err(GatewayError::Decode {
                key: key.to_string(),
                message: "tombstone source is not a JSON object".to_string(),
            });
        }
        let target = deleted_key(key);
        self.put_json(&target, &payload, &stored.metadata, PutCondition::Overwrite)?;
        self.store.delete(key)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests;
