// crates/changedesk-store/src/optimistic.rs
// ============================================================================
// Module: Optimistic Writer
// Description: ETag-guarded read-modify-write against the archive prefix.
// Purpose: Serialize concurrent writers per record without a coordinator.
// Dependencies: crate::{gateway, layout}, changedesk-core
// ============================================================================

//! ## Overview
//! Every archive mutation goes through [`OptimisticWriter::update`]: read the
//! current record with its ETag, apply the caller's mutation, bump the
//! version to `read_version + 1`, snapshot the pre-write state under
//! `versions/`, and replace conditionally. A failed precondition backs off
//! exponentially (100 ms base), re-reads, and re-applies the mutation so the
//! modification trail merges by concatenation with dedup. After three failed
//! attempts the write surfaces [`WriteError::ConcurrentModification`].
//!
//! Creates use the create-only precondition, which closes the
//! duplicate-submit race without locks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use changedesk_core::ObjectRecord;
use changedesk_core::TransitionError;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::gateway::ObjectGateway;
use crate::layout::archive_key;
use crate::layout::routing_metadata;
use crate::layout::version_key;
use crate::object_store::ETag;
use crate::object_store::PutCondition;
use crate::object_store::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Base delay before the first conditional-write retry.
const BASE_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Maximum number of conditional-write attempts.
const MAX_WRITE_ATTEMPTS: u32 = 3;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Archive write errors.
#[derive(Debug, Error)]
pub enum WriteError {
    /// No record exists under the identifier.
    #[error("record not found: {id}")]
    NotFound {
        /// Record identifier.
        id: String,
    },
    /// A record already exists under the identifier.
    #[error("record already exists: {id}")]
    AlreadyExists {
        /// Record identifier.
        id: String,
    },
    /// The mutation requested an invalid status transition.
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// The mutation rejected the current record state.
    #[error("update rejected: {0}")]
    Rejected(String),
    /// Conditional write lost against concurrent writers on every attempt.
    #[error("concurrent modification on {id} after {attempts} attempts; refresh and retry")]
    ConcurrentModification {
        /// Record identifier.
        id: String,
        /// Number of attempts made.
        attempts: u32,
    },
    /// Underlying gateway or store failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// ETag-guarded writer for canonical archive records.
#[derive(Clone)]
pub struct OptimisticWriter {
    /// Typed gateway used for every store access.
    gateway: ObjectGateway,
    /// Base delay for exponential backoff.
    base_delay: Duration,
    /// Maximum conditional-write attempts.
    max_attempts: u32,
}

impl OptimisticWriter {
    /// Creates a writer with the default retry policy.
    #[must_use]
    pub fn new(gateway: ObjectGateway) -> Self {
        Self {
            gateway,
            base_delay: BASE_RETRY_DELAY,
            max_attempts: MAX_WRITE_ATTEMPTS,
        }
    }

    /// Overrides the retry policy (tests shorten the backoff).
    #[must_use]
    pub const fn with_retry_policy(mut self, base_delay: Duration, max_attempts: u32) -> Self {
        self.base_delay = base_delay;
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the gateway the writer operates through.
    #[must_use]
    pub const fn gateway(&self) -> &ObjectGateway {
        &self.gateway
    }

    /// Creates the archive record, failing when one already exists.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::AlreadyExists`] when the create-only
    /// precondition fails, or [`WriteError::Gateway`] on other failures.
    pub fn create(&self, record: &ObjectRecord) -> Result<ETag, WriteError> {
        let id = record.id_str().to_string();
        let key = archive_key(&id).map_err(GatewayError::Store)?;
        let metadata = routing_metadata(record, None);
        match self.gateway.put_json(&key, record, &metadata, PutCondition::IfNoneMatch) {
            Ok(etag) => Ok(etag),
            Err(GatewayError::Store(StoreError::ETagMismatch { .. })) => {
                Err(WriteError::AlreadyExists {
                    id,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Applies a mutation to the archive record with optimistic retry.
    ///
    /// The mutation runs against a fresh read on every attempt; it must not
    /// carry side effects of its own. The stored version is always
    /// `read_version + 1`, and the pre-write state is snapshotted under
    /// `versions/<id>/v<read_version>.json` before the replace.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::NotFound`] when no record exists,
    /// [`WriteError::ConcurrentModification`] when every conditional attempt
    /// loses, or whatever error the mutation itself returns.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<(ObjectRecord, ETag), WriteError>
    where
        F: Fn(&mut ObjectRecord) -> Result<(), WriteError>,
    {
        let key = archive_key(id).map_err(GatewayError::Store)?;
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            let (current, read_etag) = match self.gateway.get_json::<ObjectRecord>(&key) {
                Ok(found) => found,
                Err(GatewayError::Store(StoreError::NotFound { .. })) => {
                    return Err(WriteError::NotFound {
                        id: id.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            };
            let mut next = current.clone();
            mutate(&mut next)?;
            next.version = current.version.saturating_add(1);

            let snapshot_key = version_key(id, current.version).map_err(GatewayError::Store)?;
            self.gateway.put_json(
                &snapshot_key,
                &current,
                &routing_metadata(&current, None),
                PutCondition::Overwrite,
            )?;

            let metadata = routing_metadata(&next, None);
            match self.gateway.put_json(&key, &next, &metadata, PutCondition::IfMatch(read_etag)) {
                Ok(etag) => return Ok((next, etag)),
                Err(GatewayError::Store(StoreError::ETagMismatch { .. })) => {
                    if attempt >= self.max_attempts {
                        return Err(WriteError::ConcurrentModification {
                            id: id.to_string(),
                            attempts: attempt,
                        });
                    }
                    thread::sleep(self.backoff_delay(attempt));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Returns the backoff delay for the given completed attempt count.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}
