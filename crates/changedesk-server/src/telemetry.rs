// crates/changedesk-server/src/telemetry.rs
// ============================================================================
// Module: Reactor Telemetry
// Description: Observability hooks for the HTTP facade and reactor.
// Purpose: Provide metric events and latency buckets without hard deps.
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for request counters and
//! latency histograms. It is intentionally dependency-light so deployments
//! can plug in Prometheus or OpenTelemetry without redesign. Labels must not
//! carry payload content or addresses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for request histograms.
pub const REQUEST_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Public-surface action classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ApiAction {
    /// POST /upload.
    Upload,
    /// Status transitions (approve/complete/cancel).
    Transition,
    /// Record edits (PUT).
    Edit,
    /// Listings and fetches.
    Read,
    /// Draft CRUD.
    Drafts,
    /// Search, statistics, and recent listings.
    Query,
    /// Survey webhook ingest.
    Webhook,
    /// Auth check and user context.
    Identity,
}

impl ApiAction {
    /// Returns a stable label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Transition => "transition",
            Self::Edit => "edit",
            Self::Read => "read",
            Self::Drafts => "drafts",
            Self::Query => "query",
            Self::Webhook => "webhook",
            Self::Identity => "identity",
        }
    }
}

/// Request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ApiOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

impl ApiOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Request metric event payload.
#[derive(Debug, Clone)]
pub struct RequestMetricEvent {
    /// Action classification.
    pub action: ApiAction,
    /// Request outcome.
    pub outcome: ApiOutcome,
    /// Response HTTP status.
    pub status: u16,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for facade requests and latencies.
pub trait ReactorMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: RequestMetricEvent);

    /// Records a latency observation for the request.
    fn record_latency(&self, event: RequestMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl ReactorMetrics for NoopMetrics {
    fn record_request(&self, _event: RequestMetricEvent) {}

    fn record_latency(&self, _event: RequestMetricEvent, _latency: Duration) {}
}
