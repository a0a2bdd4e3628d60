// crates/changedesk-store/src/lib.rs
// ============================================================================
// Module: Changedesk Store Library
// Description: Object-store gateway, key layout, and optimistic writer.
// Purpose: Provide the single mutation path for canonical records.
// Dependencies: crate::{gateway, layout, object_store, optimistic}
// ============================================================================

//! ## Overview
//! The object store is authoritative and doubles as the event bus: the
//! canonical record lives under `archive/`, transient trigger copies under
//! `customers/<code>/`, drafts under `drafts/`, immutable snapshots under
//! `versions/`, and tombstones under `deleted/`. This crate owns that layout,
//! the typed gateway over raw store bytes, and the ETag-guarded
//! read-modify-write protocol every mutation goes through.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod gateway;
pub mod layout;
pub mod object_store;
pub mod optimistic;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use gateway::GatewayError;
pub use gateway::ObjectGateway;
pub use layout::RequestType;
pub use layout::archive_key;
pub use layout::customer_key;
pub use layout::deleted_key;
pub use layout::draft_key;
pub use layout::routing_metadata;
pub use layout::survey_form_key;
pub use layout::survey_result_key;
pub use layout::version_key;
pub use layout::versions_prefix;
pub use object_store::ETag;
pub use object_store::MemoryObjectStore;
pub use object_store::ObjectMeta;
pub use object_store::ObjectStore;
pub use object_store::PutCondition;
pub use object_store::S3ObjectStore;
pub use object_store::S3ObjectStoreConfig;
pub use object_store::StoreError;
pub use object_store::StoredObject;
pub use optimistic::OptimisticWriter;
pub use optimistic::WriteError;
