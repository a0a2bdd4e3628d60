// crates/changedesk-server/src/audit.rs
// ============================================================================
// Module: Reactor Audit Logging
// Description: Structured audit events for transitions and side effects.
// Purpose: Emit JSON-line audit logs without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for reactor activity:
//! auth decisions, status transitions, and side-effect dispatch. Sinks write
//! one JSON object per line so deployments can route events to their
//! preferred logging pipeline without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Auth decision audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Decision outcome (`allow` or `deny`).
    pub decision: &'static str,
    /// Requested action label.
    pub action: String,
    /// Caller address when authenticated.
    pub subject: Option<String>,
    /// Failure reason (deny events).
    pub reason: Option<String>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(action: &str, subject: &str) -> Self {
        Self {
            event: "reactor_auth",
            timestamp_ms: epoch_millis(),
            decision: "allow",
            action: action.to_string(),
            subject: Some(subject.to_string()),
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(action: &str, subject: Option<&str>, reason: &str) -> Self {
        Self {
            event: "reactor_auth",
            timestamp_ms: epoch_millis(),
            decision: "deny",
            action: action.to_string(),
            subject: subject.map(str::to_string),
            reason: Some(reason.to_string()),
        }
    }
}

/// Status transition audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Record identifier.
    pub object_id: String,
    /// Record kind tag.
    pub object_type: String,
    /// Status before the transition.
    pub prior_status: Option<String>,
    /// Status after the transition.
    pub status: String,
    /// Acting user address.
    pub actor: String,
    /// Version written by the transition.
    pub version: u64,
}

impl TransitionAuditEvent {
    /// Builds a transition event with a consistent timestamp.
    #[must_use]
    pub fn new(
        object_id: &str,
        object_type: &str,
        prior_status: Option<&str>,
        status: &str,
        actor: &str,
        version: u64,
    ) -> Self {
        Self {
            event: "reactor_transition",
            timestamp_ms: epoch_millis(),
            object_id: object_id.to_string(),
            object_type: object_type.to_string(),
            prior_status: prior_status.map(str::to_string),
            status: status.to_string(),
            actor: actor.to_string(),
            version,
        }
    }
}

/// Side-effect dispatch audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SideEffectAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Record identifier.
    pub object_id: String,
    /// Side-effect label (`meeting_schedule`, `mail_fanout`, ...).
    pub effect: &'static str,
    /// Whether the side effect succeeded.
    pub success: bool,
    /// Failure detail when unsuccessful.
    pub error: Option<String>,
    /// Customer code for per-customer effects.
    pub customer_code: Option<String>,
}

impl SideEffectAuditEvent {
    /// Builds a side-effect event with a consistent timestamp.
    #[must_use]
    pub fn new(
        object_id: &str,
        effect: &'static str,
        success: bool,
        error: Option<String>,
        customer_code: Option<String>,
    ) -> Self {
        Self {
            event: "reactor_side_effect",
            timestamp_ms: epoch_millis(),
            object_id: object_id.to_string(),
            effect,
            success,
            error,
            customer_code,
        }
    }
}

/// Returns milliseconds since the Unix epoch.
fn epoch_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for reactor events.
pub trait ReactorAuditSink: Send + Sync {
    /// Records an auth decision.
    fn record_auth(&self, event: &AuthAuditEvent);

    /// Records a status transition.
    fn record_transition(&self, event: &TransitionAuditEvent);

    /// Records a side-effect dispatch.
    fn record_side_effect(&self, event: &SideEffectAuditEvent);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Serializes and writes one event line.
    fn write_line<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl ReactorAuditSink for StderrAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        Self::write_line(event);
    }

    fn record_transition(&self, event: &TransitionAuditEvent) {
        Self::write_line(event);
    }

    fn record_side_effect(&self, event: &SideEffectAuditEvent) {
        Self::write_line(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Serializes and appends one event line.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl ReactorAuditSink for FileAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        self.write_line(event);
    }

    fn record_transition(&self, event: &TransitionAuditEvent) {
        self.write_line(event);
    }

    fn record_side_effect(&self, event: &SideEffectAuditEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl ReactorAuditSink for NoopAuditSink {
    fn record_auth(&self, _event: &AuthAuditEvent) {}

    fn record_transition(&self, _event: &TransitionAuditEvent) {}

    fn record_side_effect(&self, _event: &SideEffectAuditEvent) {}
}
