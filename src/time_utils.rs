// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time as a row timestamp.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_keeps_sortable_precision() {
        let a = DateTime::from_timestamp(1_704_103_200, 1_000).unwrap();
        let b = DateTime::from_timestamp(1_704_103_200, 2_000).unwrap();

        assert_eq!(format_utc_rfc3339(a), "2024-01-01T10:00:00.000001Z");
        assert!(format_utc_rfc3339(a) < format_utc_rfc3339(b));
    }
}
