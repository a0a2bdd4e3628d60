// crates/changedesk-store/src/object_store.rs
// ============================================================================
// Module: Object Store Backends
// Description: Conditional get/put/list/copy/delete over durable object storage.
// Purpose: Provide ETag-capturing storage access with fail-closed preconditions.
// Dependencies: aws-sdk-s3, tokio, serde
// ============================================================================

//! ## Overview
//! [`ObjectStore`] is the minimal storage abstraction every component writes
//! through. Implementations capture ETags on read and honor write
//! preconditions: create-only (`IfNoneMatch`) and replace-if-match
//! (`IfMatch`). A failed precondition surfaces as the distinct
//! [`StoreError::ETagMismatch`] kind so callers can drive optimistic retry.
//! The store never interprets object content; it round-trips bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::runtime::RuntimeFlavor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum object size accepted on read.
const MAX_OBJECT_BYTES: usize = 16 * 1024 * 1024;
/// Page size for list operations.
const LIST_PAGE_SIZE: i32 = 1_000;

// ============================================================================
// SECTION: ETag
// ============================================================================

/// Opaque version token returned by the store and used for conditional writes.
///
/// # Invariants
/// - Stored without surrounding quotes regardless of backend framing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// Wraps a raw token, trimming backend quote framing.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self(raw.trim_matches('"').to_string())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Object-store access errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid key or configuration input.
    #[error("store invalid: {0}")]
    Invalid(String),
    /// Object does not exist.
    #[error("object not found: {bucket}/{key}")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
    /// Write precondition failed.
    #[error("etag mismatch on {bucket}/{key} (expected {expected})")]
    ETagMismatch {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Expected token (`*` for create-only writes).
        expected: String,
    },
    /// Object exceeds the read size limit.
    #[error("object too large: {key} ({actual_bytes} > {max_bytes})")]
    TooLarge {
        /// Object key.
        key: String,
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
    /// Backend returned an error.
    #[error("store backend error: {0}")]
    Backend(String),
    /// Local I/O failure.
    #[error("store io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Write precondition for put operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutCondition {
    /// Unconditional overwrite.
    Overwrite,
    /// Create-only: fail when any current version exists.
    IfNoneMatch,
    /// Replace-if-match: fail unless the current ETag equals the token.
    IfMatch(ETag),
}

/// One object read from the store.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Raw object bytes.
    pub bytes: Vec<u8>,
    /// ETag captured at read time.
    pub etag: ETag,
    /// User metadata attached to the object.
    pub metadata: BTreeMap<String, String>,
}

/// Listing entry describing one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Current ETag.
    pub etag: ETag,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Minimal conditional object-store abstraction.
pub trait ObjectStore: Send + Sync {
    /// Returns the bucket this store writes into.
    fn bucket(&self) -> &str;

    /// Reads a single object with its ETag and user metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the key is absent.
    fn get(&self, key: &str) -> Result<StoredObject, StoreError>;

    /// Writes a single object under the given precondition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ETagMismatch`] when the precondition fails.
    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        metadata: &BTreeMap<String, String>,
        condition: PutCondition,
    ) -> Result<ETag, StoreError>;

    /// Returns listing metadata for a key, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError>;

    /// Lists objects under a prefix, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    /// Copies an object, optionally replacing its user metadata.
    ///
    /// When `metadata` is `Some`, the destination carries exactly those
    /// entries (metadata-replace); when `None`, source metadata is copied.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the source is absent.
    fn copy(
        &self,
        from: &str,
        to: &str,
        metadata: Option<&BTreeMap<String, String>>,
    ) -> Result<(), StoreError>;

    /// Deletes an object. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Runtime Helper
// ============================================================================

/// Blocks on a store future using a compatible runtime.
fn block_on_with_runtime<F, T>(runtime: &Runtime, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| handle.block_on(future));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = Runtime::new()
                .map_err(|err| StoreError::Io(err.to_string()))
                .and_then(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx
            .recv()
            .unwrap_or_else(|_| Err(StoreError::Io("store thread join failed".to_string())));
    }

    runtime.block_on(future)
}

// ============================================================================
// SECTION: S3 Backend
// ============================================================================

/// Configuration for the S3-backed object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3ObjectStoreConfig {
    /// Bucket name.
    pub bucket: String,
    /// AWS region (optional; falls back to environment configuration).
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint URL (for S3-compatible stores).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Force path-style addressing (for S3-compatible stores).
    #[serde(default)]
    pub force_path_style: bool,
}

/// S3-backed object store.
pub struct S3ObjectStore {
    /// Underlying S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Tokio runtime for blocking S3 calls.
    runtime: Option<Arc<Runtime>>,
}

impl Drop for S3ObjectStore {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl S3ObjectStore {
    /// Creates a new S3 object store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the bucket is unset or the runtime cannot
    /// be created.
    pub fn new(config: &S3ObjectStoreConfig) -> Result<Self, StoreError> {
        if config.bucket.trim().is_empty() {
            return Err(StoreError::Invalid("bucket must be set".to_string()));
        }
        let runtime = Runtime::new().map_err(|err| StoreError::Io(err.to_string()))?;
        let region = config.region.clone();
        let endpoint = config.endpoint.clone();
        let shared_config = block_on_with_runtime(&runtime, async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region));
            }
            if let Some(endpoint) = endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            Ok(loader.load().await)
        })?;
        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_builder.build());
        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Returns the runtime or an error if shutdown.
    fn runtime(&self) -> Result<&Runtime, StoreError> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| StoreError::Io("store runtime closed".to_string()))
    }
}

/// Returns true when an SDK error carries a precondition-failure status.
///
/// S3 signals failed conditional writes with 412 (PreconditionFailed) and
/// concurrent conditional writes with 409 (ConditionalRequestConflict).
fn is_precondition_failure<E>(err: &aws_sdk_s3::error::SdkError<E>) -> bool {
    err.raw_response()
        .is_some_and(|response| matches!(response.status().as_u16(), 409 | 412))
}

/// Returns true when an SDK error carries a missing-key status.
fn is_missing_key<E>(err: &aws_sdk_s3::error::SdkError<E>) -> bool {
    err.raw_response().is_some_and(|response| response.status().as_u16() == 404)
}

impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            let output = client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|err| {
                    if is_missing_key(&err) {
                        StoreError::NotFound {
                            bucket: bucket.clone(),
                            key: key.clone(),
                        }
                    } else {
                        StoreError::Backend(err.to_string())
                    }
                })?;
            let etag = ETag::new(output.e_tag().unwrap_or_default());
            let metadata = output
                .metadata()
                .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            let mut reader = output.body.into_async_read();
            let mut buffer = Vec::new();
            let mut total_bytes = 0usize;
            let mut chunk = [0u8; 8192];
            loop {
                let read = reader
                    .read(&mut chunk)
                    .await
                    .map_err(|err| StoreError::Io(err.to_string()))?;
                if read == 0 {
                    break;
                }
                total_bytes = total_bytes
                    .checked_add(read)
                    .ok_or_else(|| StoreError::Io("object size overflow".to_string()))?;
                if total_bytes > MAX_OBJECT_BYTES {
                    return Err(StoreError::TooLarge {
                        key: key.clone(),
                        max_bytes: MAX_OBJECT_BYTES,
                        actual_bytes: total_bytes,
                    });
                }
                buffer.extend_from_slice(&chunk[.. read]);
            }
            Ok(StoredObject {
                bytes: buffer,
                etag,
                metadata,
            })
        })
    }

    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        metadata: &BTreeMap<String, String>,
        condition: PutCondition,
    ) -> Result<ETag, StoreError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        let content_type = content_type.map(str::to_string);
        let metadata: Vec<(String, String)> =
            metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        block_on_with_runtime(self.runtime()?, async move {
            let mut request =
                client.put_object().bucket(&bucket).key(&key).body(ByteStream::from(bytes));
            if let Some(content_type) = content_type {
                request = request.content_type(content_type);
            }
            for (name, value) in metadata {
                request = request.metadata(name, value);
            }
            let expected = match &condition {
                PutCondition::Overwrite => None,
                PutCondition::IfNoneMatch => {
                    request = request.if_none_match("*");
                    Some("*".to_string())
                }
                PutCondition::IfMatch(etag) => {
                    request = request.if_match(etag.as_str());
                    Some(etag.as_str().to_string())
                }
            };
            let output = request.send().await.map_err(|err| {
                if let Some(expected) = expected
                    && is_precondition_failure(&err)
                {
                    StoreError::ETagMismatch {
                        bucket: bucket.clone(),
                        key: key.clone(),
                        expected,
                    }
                } else {
                    StoreError::Backend(err.to_string())
                }
            })?;
            Ok(ETag::new(output.e_tag().unwrap_or_default()))
        })
    }

    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            match client.head_object().bucket(&bucket).key(&key).send().await {
                Ok(output) => Ok(Some(ObjectMeta {
                    key,
                    size: output
                        .content_length()
                        .and_then(|length| u64::try_from(length).ok())
                        .unwrap_or_default(),
                    etag: ETag::new(output.e_tag().unwrap_or_default()),
                })),
                Err(err) => {
                    if is_missing_key(&err) {
                        Ok(None)
                    } else {
                        Err(StoreError::Backend(err.to_string()))
                    }
                }
            }
        })
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let bucket = self.bucket.clone();
        let prefix = prefix.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            let mut entries = Vec::new();
            let mut continuation: Option<String> = None;
            loop {
                let mut request = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(&prefix)
                    .max_keys(LIST_PAGE_SIZE);
                if let Some(token) = continuation.take() {
                    request = request.continuation_token(token);
                }
                let output =
                    request.send().await.map_err(|err| StoreError::Backend(err.to_string()))?;
                for object in output.contents() {
                    let Some(key) = object.key() else {
                        continue;
                    };
                    entries.push(ObjectMeta {
                        key: key.to_string(),
                        size: object
                            .size()
                            .and_then(|size| u64::try_from(size).ok())
                            .unwrap_or_default(),
                        etag: ETag::new(object.e_tag().unwrap_or_default()),
                    });
                }
                match output.next_continuation_token() {
                    Some(token) => continuation = Some(token.to_string()),
                    None => break,
                }
            }
            entries.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(entries)
        })
    }

    fn copy(
        &self,
        from: &str,
        to: &str,
        metadata: Option<&BTreeMap<String, String>>,
    ) -> Result<(), StoreError> {
        let bucket = self.bucket.clone();
        let from = from.to_string();
        let to = to.to_string();
        let client = self.client.clone();
        let metadata: Option<Vec<(String, String)>> = metadata
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        block_on_with_runtime(self.runtime()?, async move {
            let mut request = client
                .copy_object()
                .bucket(&bucket)
                .copy_source(format!("{bucket}/{from}"))
                .key(&to);
            if let Some(entries) = metadata {
                request = request.metadata_directive(MetadataDirective::Replace);
                for (name, value) in entries {
                    request = request.metadata(name, value);
                }
            }
            request.send().await.map_err(|err| {
                if is_missing_key(&err) {
                    StoreError::NotFound {
                        bucket: bucket.clone(),
                        key: from.clone(),
                    }
                } else {
                    StoreError::Backend(err.to_string())
                }
            })?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            client
                .delete_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            Ok(())
        })
    }
}

// ============================================================================
// SECTION: In-Memory Backend
// ============================================================================

/// One stored entry in the in-memory backend.
#[derive(Debug, Clone)]
struct MemoryEntry {
    /// Object bytes.
    bytes: Vec<u8>,
    /// User metadata.
    metadata: BTreeMap<String, String>,
    /// Current ETag.
    etag: ETag,
}

/// In-memory object store with full ETag semantics.
///
/// Used for tests and local development mode. Conditional writes are atomic
/// under one coarse lock, which makes it a faithful stand-in for exercising
/// the optimistic-write protocol.
pub struct MemoryObjectStore {
    /// Bucket label reported to callers.
    bucket: String,
    /// Stored entries keyed by object key.
    entries: Mutex<BTreeMap<String, MemoryEntry>>,
    /// Counter feeding generated ETags.
    sequence: Mutex<u64>,
}

impl MemoryObjectStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            entries: Mutex::new(BTreeMap::new()),
            sequence: Mutex::new(0),
        }
    }

    /// Returns the next generated ETag.
    fn next_etag(&self) -> Result<ETag, StoreError> {
        let mut sequence = self
            .sequence
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))?;
        *sequence = sequence.wrapping_add(1);
        Ok(ETag::new(format!("mem-{sequence:08x}", sequence = *sequence)))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))?;
        let entry = entries.get(key).ok_or_else(|| StoreError::NotFound {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        })?;
        Ok(StoredObject {
            bytes: entry.bytes.clone(),
            etag: entry.etag.clone(),
            metadata: entry.metadata.clone(),
        })
    }

    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
        metadata: &BTreeMap<String, String>,
        condition: PutCondition,
    ) -> Result<ETag, StoreError> {
        let etag = self.next_etag()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))?;
        match &condition {
            PutCondition::Overwrite => {}
            PutCondition::IfNoneMatch => {
                if entries.contains_key(key) {
                    return Err(StoreError::ETagMismatch {
                        bucket: self.bucket.clone(),
                        key: key.to_string(),
                        expected: "*".to_string(),
                    });
                }
            }
            PutCondition::IfMatch(expected) => {
                let current = entries.get(key).map(|entry| &entry.etag);
                if current != Some(expected) {
                    return Err(StoreError::ETagMismatch {
                        bucket: self.bucket.clone(),
                        key: key.to_string(),
                        expected: expected.as_str().to_string(),
                    });
                }
            }
        }
        entries.insert(
            key.to_string(),
            MemoryEntry {
                bytes,
                metadata: metadata.clone(),
                etag: etag.clone(),
            },
        );
        Ok(etag)
    }

    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))?;
        Ok(entries.get(key).map(|entry| ObjectMeta {
            key: key.to_string(),
            size: entry.bytes.len() as u64,
            etag: entry.etag.clone(),
        }))
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))?;
        Ok(entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| ObjectMeta {
                key: key.clone(),
                size: entry.bytes.len() as u64,
                etag: entry.etag.clone(),
            })
            .collect())
    }

    fn copy(
        &self,
        from: &str,
        to: &str,
        metadata: Option<&BTreeMap<String, String>>,
    ) -> Result<(), StoreError> {
        let etag = self.next_etag()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))?;
        let source = entries.get(from).cloned().ok_or_else(|| StoreError::NotFound {
            bucket: self.bucket.clone(),
            key: from.to_string(),
        })?;
        let replaced = MemoryEntry {
            bytes: source.bytes,
            metadata: metadata.cloned().unwrap_or(source.metadata),
            etag,
        };
        entries.insert(to.to_string(), replaced);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
