// crates/changedesk-server/src/auth.rs
// ============================================================================
// Module: Identity Trust & Authorization
// Description: Identity-gateway header trust and change-management policy.
// Purpose: Provide strict, fail-closed auth decisions with audit events.
// Dependencies: changedesk-core, axum
// ============================================================================

//! ## Overview
//! Trust is derived from headers set by the upstream identity gateway:
//! `x-authenticated: true` plus `x-user-email`. Missing or false headers are
//! unauthenticated (401). The policy gate restricts change-management
//! actions to permitted email domains (403), and per-object mutation
//! additionally requires ownership: the caller must be the record's creator
//! or submitter. All decisions are fail-closed and audited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use changedesk_core::ObjectRecord;
use changedesk_core::UserEmail;
use thiserror::Error;

use crate::audit::AuthAuditEvent;
use crate::audit::ReactorAuditSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header asserting the caller passed the identity gateway.
pub const AUTHENTICATED_HEADER: &str = "x-authenticated";
/// Header carrying the authenticated email address.
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Maximum accepted header value length.
const MAX_HEADER_VALUE_BYTES: usize = 512;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication or authorization errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or invalid identity headers.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Caller is authenticated but not permitted.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Authenticated request identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    /// Caller address asserted by the identity gateway.
    pub email: UserEmail,
}

impl RequestIdentity {
    /// Derives the identity from gateway headers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when the authenticated flag is
    /// absent or not `true`, or the email header is missing or malformed.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let authenticated = header_value(headers, AUTHENTICATED_HEADER)?
            .ok_or_else(|| AuthError::Unauthenticated("missing x-authenticated".to_string()))?;
        if !authenticated.eq_ignore_ascii_case("true") {
            return Err(AuthError::Unauthenticated("caller is not authenticated".to_string()));
        }
        let raw_email = header_value(headers, USER_EMAIL_HEADER)?
            .ok_or_else(|| AuthError::Unauthenticated("missing x-user-email".to_string()))?;
        let email = UserEmail::parse(&raw_email)
            .map_err(|err| AuthError::Unauthenticated(err.to_string()))?;
        Ok(Self {
            email,
        })
    }
}

/// Reads one trimmed header value with a size limit.
fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value =
        value.to_str().map_err(|_| AuthError::Unauthenticated(format!("{name} not UTF-8")))?;
    if value.len() > MAX_HEADER_VALUE_BYTES {
        return Err(AuthError::Unauthenticated(format!("{name} too large")));
    }
    Ok(Some(value.trim().to_string()))
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Change-management authorization policy.
pub struct AuthPolicy {
    /// Permitted email domains; empty permits every authenticated caller.
    allowed_domains: Vec<String>,
    /// Addresses granted the admin role.
    admin_users: Vec<String>,
}

impl AuthPolicy {
    /// Builds a policy from configured domain and admin lists.
    #[must_use]
    pub fn new(allowed_domains: Vec<String>, admin_users: Vec<String>) -> Self {
        Self {
            allowed_domains: allowed_domains
                .into_iter()
                .map(|domain| domain.to_ascii_lowercase())
                .collect(),
            admin_users: admin_users.into_iter().map(|user| user.to_ascii_lowercase()).collect(),
        }
    }

    /// Returns true when the caller holds the admin role.
    #[must_use]
    pub fn is_admin(&self, identity: &RequestIdentity) -> bool {
        self.admin_users.iter().any(|admin| admin == identity.email.as_str())
    }

    /// Authorizes a change-management action for the caller's domain.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] when the caller's domain is not
    /// in the permitted set.
    pub fn authorize_action(
        &self,
        identity: &RequestIdentity,
        action: &str,
        audit: &dyn ReactorAuditSink,
    ) -> Result<(), AuthError> {
        if !self.allowed_domains.is_empty()
            && !self.allowed_domains.iter().any(|domain| domain == identity.email.domain())
        {
            let error = AuthError::Unauthorized("email domain not permitted".to_string());
            audit.record_auth(&AuthAuditEvent::denied(
                action,
                Some(identity.email.as_str()),
                &error.to_string(),
            ));
            return Err(error);
        }
        audit.record_auth(&AuthAuditEvent::allowed(action, identity.email.as_str()));
        Ok(())
    }

    /// Enforces the per-object ownership rule for mutations.
    ///
    /// Admins bypass ownership; otherwise the caller must equal the record's
    /// `created_by` or `submitted_by`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for non-owner callers.
    pub fn ensure_owner(
        &self,
        identity: &RequestIdentity,
        record: &ObjectRecord,
        action: &str,
        audit: &dyn ReactorAuditSink,
    ) -> Result<(), AuthError> {
        if self.is_admin(identity) {
            audit.record_auth(&AuthAuditEvent::allowed(action, identity.email.as_str()));
            return Ok(());
        }
        let owns = record.created_by.as_ref() == Some(&identity.email)
            || record.submitted_by.as_ref() == Some(&identity.email);
        if owns {
            audit.record_auth(&AuthAuditEvent::allowed(action, identity.email.as_str()));
            Ok(())
        } else {
            let error = AuthError::Unauthorized("caller does not own this record".to_string());
            audit.record_auth(&AuthAuditEvent::denied(
                action,
                Some(identity.email.as_str()),
                &error.to_string(),
            ));
            Err(error)
        }
    }
}
