// crates/changedesk-core/src/identifiers.rs
// ============================================================================
// Module: Changedesk Identifiers
// Description: Canonical identifiers for changes, announcements, customers, and users.
// Purpose: Provide strongly typed, validated identifiers with stable wire forms.
// Dependencies: serde, rand
// ============================================================================

//! ## Overview
//! This module defines the identifier types used throughout Changedesk.
//! Change identifiers are generated (`CHG-<timestamp>-<6-char random>`);
//! announcement identifiers are caller-assigned (`<PREFIX>-<YYYY>-<NNN>`).
//! All identifiers validate at construction boundaries and serialize as plain
//! strings on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::object::AnnouncementSubtype;
use crate::time::UtcTimestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix carried by every change identifier.
const CHANGE_ID_PREFIX: &str = "CHG-";
/// Length of the random suffix on generated change identifiers.
const CHANGE_ID_SUFFIX_LENGTH: usize = 6;
/// Alphabet used for random change identifier suffixes.
const CHANGE_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
/// Maximum accepted identifier length.
const MAX_IDENTIFIER_LENGTH: usize = 128;
/// Minimum customer code length.
const MIN_CUSTOMER_CODE_LENGTH: usize = 2;
/// Maximum customer code length.
const MAX_CUSTOMER_CODE_LENGTH: usize = 16;
/// Maximum accepted email length.
const MAX_EMAIL_LENGTH: usize = 254;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier parse and validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// Change identifier is malformed.
    #[error("invalid change id: {0}")]
    InvalidChangeId(String),
    /// Announcement identifier is malformed.
    #[error("invalid announcement id: {0}")]
    InvalidAnnouncementId(String),
    /// Customer code is malformed.
    #[error("invalid customer code: {0}")]
    InvalidCustomerCode(String),
    /// Email address is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(String),
}

// ============================================================================
// SECTION: Change Identifier
// ============================================================================

/// Change record identifier.
///
/// # Invariants
/// - Always begins with `CHG-`.
/// - Contains no path separators or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    /// Generates a fresh identifier from the given instant.
    ///
    /// The wire form is `CHG-<yyyy-mm-ddThh-mm-ss>-<6-char random>`.
    #[must_use]
    pub fn generate(now: UtcTimestamp) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0 .. CHANGE_ID_SUFFIX_LENGTH)
            .map(|_| {
                let index = rng.gen_range(0 .. CHANGE_ID_ALPHABET.len());
                char::from(CHANGE_ID_ALPHABET[index])
            })
            .collect();
        Self(format!("{CHANGE_ID_PREFIX}{}-{suffix}", now.to_key_form()))
    }

    /// Parses and validates a change identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidChangeId`] when the value does not
    /// carry the `CHG-` prefix or contains unsafe characters.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        if !value.starts_with(CHANGE_ID_PREFIX)
            || value.len() <= CHANGE_ID_PREFIX.len()
            || value.len() > MAX_IDENTIFIER_LENGTH
            || !is_key_safe(value)
        {
            return Err(IdentifierError::InvalidChangeId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Announcement Identifier
// ============================================================================

/// Announcement record identifier.
///
/// # Invariants
/// - Wire form is `<PREFIX>-<YYYY>-<NNN>` with the prefix determined by the
///   announcement subtype (`CIC`, `FIN`, `INN`, `GEN`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnouncementId(String);

impl AnnouncementId {
    /// Builds an identifier from subtype, year, and sequence number.
    #[must_use]
    pub fn compose(subtype: AnnouncementSubtype, year: i32, sequence: u32) -> Self {
        Self(format!("{}-{year:04}-{sequence:03}", subtype.id_prefix()))
    }

    /// Parses and validates an announcement identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidAnnouncementId`] when the value does
    /// not match `<PREFIX>-<YYYY>-<NNN>` for a known subtype prefix.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let invalid = || IdentifierError::InvalidAnnouncementId(value.to_string());
        if value.len() > MAX_IDENTIFIER_LENGTH || !is_key_safe(value) {
            return Err(invalid());
        }
        let mut parts = value.splitn(3, '-');
        let prefix = parts.next().ok_or_else(invalid)?;
        let year = parts.next().ok_or_else(invalid)?;
        let sequence = parts.next().ok_or_else(invalid)?;
        if AnnouncementSubtype::from_id_prefix(prefix).is_none() {
            return Err(invalid());
        }
        if year.len() != 4 || !year.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }
        if sequence.is_empty() || !sequence.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the subtype encoded in the identifier prefix, when recognized.
    #[must_use]
    pub fn subtype(&self) -> Option<AnnouncementSubtype> {
        self.0.split('-').next().and_then(AnnouncementSubtype::from_id_prefix)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnouncementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Object Identifier
// ============================================================================

/// Identifier of either record kind, used for store keys and routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    /// Change identifier.
    Change(ChangeId),
    /// Announcement identifier.
    Announcement(AnnouncementId),
}

impl ObjectId {
    /// Parses an identifier of either kind.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value matches neither format.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        if value.starts_with(CHANGE_ID_PREFIX) {
            return ChangeId::parse(value).map(Self::Change);
        }
        AnnouncementId::parse(value).map(Self::Announcement)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Change(id) => id.as_str(),
            Self::Announcement(id) => id.as_str(),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Customer Code
// ============================================================================

/// Opaque short code denoting a recipient tenancy.
///
/// # Invariants
/// - Lowercase ASCII alphanumerics, 2-16 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerCode(String);

impl CustomerCode {
    /// Parses and validates a customer code.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidCustomerCode`] when the value is
    /// empty, too long, or carries characters outside `[a-z0-9]`.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        if value.len() < MIN_CUSTOMER_CODE_LENGTH
            || value.len() > MAX_CUSTOMER_CODE_LENGTH
            || !value.bytes().all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit())
        {
            return Err(IdentifierError::InvalidCustomerCode(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: User Email
// ============================================================================

/// Email address asserted by the upstream identity gateway.
///
/// # Invariants
/// - Contains exactly one `@` with a non-empty local part and a domain that
///   carries at least one dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserEmail(String);

impl UserEmail {
    /// Parses and validates an email address.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidEmail`] when the shape is not a
    /// plausible address.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let trimmed = value.trim();
        let invalid = || IdentifierError::InvalidEmail(value.to_string());
        if trimmed.is_empty() || trimmed.len() > MAX_EMAIL_LENGTH {
            return Err(invalid());
        }
        let mut parts = trimmed.splitn(2, '@');
        let local = parts.next().ok_or_else(invalid)?;
        let domain = parts.next().ok_or_else(invalid)?;
        if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.contains('@') {
            return Err(invalid());
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Returns the domain portion of the address.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit('@').next().unwrap_or_default()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when the value is safe to embed in an object key.
fn is_key_safe(value: &str) -> bool {
    value.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
        && !value.contains("..")
}
