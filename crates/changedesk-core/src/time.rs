// crates/changedesk-core/src/time.rs
// ============================================================================
// Module: Changedesk Time Model
// Description: Canonical RFC3339 UTC timestamps for records and audit entries.
// Purpose: Provide one wire format for every stamped instant in the system.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Every timestamp that lands in a stored record serializes as an RFC3339 UTC
//! string. [`UtcTimestamp`] wraps [`time::OffsetDateTime`] and normalizes to
//! UTC at construction so two timestamps for the same instant always compare
//! and serialize identically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// RFC3339 UTC timestamp used in object records and modification entries.
///
/// # Invariants
/// - The inner instant is always expressed in UTC.
/// - Serialization is the RFC3339 wire form (`2025-10-20T02:00:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcTimestamp(OffsetDateTime);

impl UtcTimestamp {
    /// Returns the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wraps an instant, normalizing it to UTC.
    #[must_use]
    pub fn from_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    /// Parses an RFC3339 string into a timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`time::error::Parse`] when the input is not valid RFC3339.
    pub fn parse(value: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(value, &Rfc3339).map(Self::from_datetime)
    }

    /// Returns the RFC3339 wire form.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.format(&Rfc3339).unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
    }

    /// Returns the underlying instant.
    #[must_use]
    pub const fn inner(&self) -> OffsetDateTime {
        self.0
    }

    /// Returns the calendar year of the instant.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the calendar quarter (1-4) of the instant.
    #[must_use]
    pub const fn quarter(&self) -> u8 {
        match self.0.month() {
            time::Month::January | time::Month::February | time::Month::March => 1,
            time::Month::April | time::Month::May | time::Month::June => 2,
            time::Month::July | time::Month::August | time::Month::September => 3,
            time::Month::October | time::Month::November | time::Month::December => 4,
        }
    }

    /// Returns a filesystem-safe compact form (`yyyy-mm-ddThh-mm-ss`).
    ///
    /// Colons are replaced so the value can be embedded in object keys and
    /// generated identifiers.
    #[must_use]
    pub fn to_key_form(&self) -> String {
        let rendered = self.to_rfc3339();
        let trimmed = rendered.split('.').next().unwrap_or(&rendered);
        trimmed.trim_end_matches('Z').replace(':', "-")
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for UtcTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests;
