// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TEXT-column codecs shared by the query modules.
//!
//! Timestamps are stored as `%Y-%m-%dT%H:%M:%S%.3fZ`, amounts and enums
//! as their canonical string forms. Parse failures surface as
//! `FromSqlConversionFailure` so they read as what they are: corrupt
//! rows, not logic errors.

use chrono::{DateTime, Utc};

/// Format a timestamp for a TEXT column.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Format an optional timestamp for a TEXT column.
pub(crate) fn opt_ts(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(ts)
}

/// Parse a TEXT column into any `FromStr` domain value, mapping failures
/// to a rusqlite conversion error carrying the column index.
pub(crate) fn parse_text<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse an optional TEXT column.
pub(crate) fn parse_opt_text<T>(idx: usize, value: Option<String>) -> rusqlite::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.map(|v| parse_text(idx, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use tipflow_core::PaymentStatus;

    #[test]
    fn timestamp_round_trips() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 45).unwrap();
        let text = ts(dt);
        assert_eq!(text, "2026-03-01T12:30:45.000Z");
        let parsed: DateTime<Utc> = parse_text(0, text).unwrap();
        assert_eq!(parsed, dt);
    }

    #[test]
    fn decimal_round_trips() {
        let amount: Decimal = parse_text(0, "10.00".to_string()).unwrap();
        assert_eq!(amount.to_string(), "10.00");
    }

    #[test]
    fn status_parses_from_storage_text() {
        let status: PaymentStatus = parse_text(0, "REFUND_PENDING".to_string()).unwrap();
        assert_eq!(status, PaymentStatus::RefundPending);
    }

    #[test]
    fn garbage_becomes_conversion_failure() {
        let result: rusqlite::Result<PaymentStatus> = parse_text(3, "NOT_A_STATUS".to_string());
        assert!(matches!(
            result,
            Err(rusqlite::Error::FromSqlConversionFailure(3, _, _))
        ));
    }
}
