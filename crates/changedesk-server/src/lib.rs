// crates/changedesk-server/src/lib.rs
// ============================================================================
// Module: Changedesk Server Library
// Description: Reactor, transition handlers, and the public HTTP facade.
// Purpose: Wire storage, notifications, and surveys behind the request surface.
// Dependencies: crate::{audit, auth, config, http, queue, reactor, telemetry}
// ============================================================================

//! ## Overview
//! The server crate owns everything request-scoped: fail-closed
//! configuration, identity-gateway trust, the reactor that turns status
//! transitions into side effects, and the axum facade that exposes the
//! public surface. All mutation flows through the optimistic writer; all
//! per-customer work flows through the concurrency runner.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod config;
pub mod http;
pub mod queue;
pub mod reactor;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::ReactorAuditSink;
pub use audit::StderrAuditSink;
pub use auth::AuthError;
pub use auth::AuthPolicy;
pub use auth::RequestIdentity;
pub use config::ChangedeskConfig;
pub use config::ConfigError;
pub use http::AppState;
pub use http::build_router;
pub use http::serve;
pub use queue::NoopQueuePublisher;
pub use queue::QueueError;
pub use queue::QueueNotification;
pub use queue::QueuePublisher;
pub use queue::RecordingQueuePublisher;
pub use queue::SqsQueuePublisher;
pub use reactor::ApiError;
pub use reactor::Reactor;
pub use reactor::ReactorClients;
pub use reactor::TransitionResponse;
pub use telemetry::ApiAction;
pub use telemetry::ApiOutcome;
pub use telemetry::NoopMetrics;
pub use telemetry::ReactorMetrics;
pub use telemetry::RequestMetricEvent;
