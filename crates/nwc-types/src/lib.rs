//! NWC Types - Canonical domain types for the Nostr Wallet Connect bridge
//!
//! This crate has zero dependencies on other nwc crates. It defines:
//!
//! - Identity types (ConnectionId, SpendingLimitId, SpendingCycleId, ...)
//! - Currency descriptors labelling integer amounts
//! - Spending limit renewal frequencies
//! - The shared validation error

pub mod identity;
pub mod currency;
pub mod frequency;
pub mod error;

pub use identity::*;
pub use currency::*;
pub use frequency::*;
pub use error::*;

use chrono::{DateTime, Utc};

/// Parse a timestamp supplied at an API boundary.
///
/// Only RFC 3339 timestamps carrying an offset are accepted; a naive
/// timestamp such as `2024-05-01T10:00:00` is rejected.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ValidationError::new("timestamp", format!("'{}' is not timezone-aware RFC 3339: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_instant_with_offset() {
        let parsed = parse_instant("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_instant_rejects_naive() {
        let err = parse_instant("2024-05-01T10:00:00").unwrap_err();
        assert_eq!(err.field, "timestamp");
    }
}
