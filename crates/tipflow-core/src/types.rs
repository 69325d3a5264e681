// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain records for the settlement engine.
//!
//! These are the in-memory shapes of the four persisted tables. Timestamps
//! are `chrono::DateTime<Utc>` here and ISO-8601 TEXT at the storage
//! boundary; amounts are `rust_decimal::Decimal` here and TEXT at the
//! storage boundary.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::AuthError;
use crate::status::PaymentStatus;

/// How long a QR token is meant to live.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// Bound to a single shift; revoked when the shift ends.
    Shift,
    /// Valid for one calendar day.
    Daily,
    /// Long-lived, e.g. printed on a stand.
    Persistent,
}

/// A staff member's scannable QR token.
///
/// Tokens are never deleted; revocation and scan-cap exhaustion flip
/// `active` off and the row is retained for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrToken {
    pub id: String,
    /// The opaque unique string encoded in the QR image.
    pub token: String,
    pub staff_id: String,
    pub business_id: String,
    pub location_id: Option<String>,
    pub kind: TokenKind,
    pub shift_id: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub scan_count: u32,
    pub max_scans: Option<u32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl QrToken {
    /// Whether the token would authorize a scan at `now`, without
    /// consuming anything. The consuming check lives in storage as a
    /// guarded UPDATE; this mirror exists for listings and diagnostics.
    pub fn is_authorizable(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.valid_from <= now
            && self.valid_until.is_none_or(|until| now < until)
            && self.max_scans.is_none_or(|max| self.scan_count < max)
    }
}

/// The result of attempting to consume a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// The scan was consumed; the token is returned post-increment.
    Authorized(QrToken),
    /// Nothing was mutated.
    Rejected(AuthError),
}

/// Handle returned by a successful authorization, binding the token to
/// the staff identity it authorizes tipping for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedToken {
    pub token_id: String,
    pub staff_id: String,
    pub business_id: String,
    pub location_id: Option<String>,
    /// Scan count after this authorization.
    pub scan_count: u32,
}

impl From<&QrToken> for AuthorizedToken {
    fn from(token: &QrToken) -> Self {
        Self {
            token_id: token.id.clone(),
            staff_id: token.staff_id.clone(),
            business_id: token.business_id.clone(),
            location_id: token.location_id.clone(),
            scan_count: token.scan_count,
        }
    }
}

/// An immutable tip transaction record.
///
/// `amount`, `staff_id`, and `payment_intent_id` never change after
/// insert; the storage layer enforces this by never naming them in an
/// UPDATE. Only `status` and `succeeded_at` move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub id: String,
    pub staff_id: String,
    pub business_id: String,
    pub location_id: Option<String>,
    pub token_id: String,
    pub amount: Decimal,
    pub currency: String,
    /// Assigned by the external processor; globally unique.
    pub payment_intent_id: String,
    /// Caller-supplied; globally unique.
    pub idempotency_key: String,
    pub status: PaymentStatus,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub tip_message: Option<String>,
    /// Free-form JSON blob.
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub succeeded_at: Option<DateTime<Utc>>,
}

/// An inbound payment-provider event, retained permanently as an audit
/// log. `event_id` is the processor's id and is unique; the same id must
/// never mutate the ledger twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The axis a summary is aggregated over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeKind {
    Business,
    Location,
    Staff,
}

/// A concrete aggregation target: one business, location, or staff member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryScope {
    pub kind: ScopeKind,
    pub id: String,
}

impl SummaryScope {
    pub fn business(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Business,
            id: id.into(),
        }
    }

    pub fn location(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Location,
            id: id.into(),
        }
    }

    pub fn staff(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Staff,
            id: id.into(),
        }
    }
}

/// A derived daily rollup. Never authoritative: a `recalculate` pass
/// rebuilds it wholesale from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipSummary {
    pub id: String,
    pub scope: SummaryScope,
    pub date: NaiveDate,
    pub total_tips: Decimal,
    pub tip_count: u32,
    pub currency: String,
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_token() -> QrToken {
        QrToken {
            id: "tok-1".into(),
            token: "a".repeat(48),
            staff_id: "staff-1".into(),
            business_id: "biz-1".into(),
            location_id: None,
            kind: TokenKind::Shift,
            shift_id: Some("shift-7".into()),
            valid_from: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            valid_until: Some(Utc.with_ymd_and_hms(2026, 3, 1, 17, 0, 0).unwrap()),
            scan_count: 0,
            max_scans: Some(2),
            active: true,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 55, 0).unwrap(),
            last_scanned_at: None,
        }
    }

    #[test]
    fn authorizable_inside_window() {
        let token = sample_token();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(token.is_authorizable(now));
    }

    #[test]
    fn not_authorizable_before_window() {
        let token = sample_token();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        assert!(!token.is_authorizable(now));
    }

    #[test]
    fn valid_until_is_exclusive() {
        let token = sample_token();
        let at_boundary = Utc.with_ymd_and_hms(2026, 3, 1, 17, 0, 0).unwrap();
        assert!(!token.is_authorizable(at_boundary));
    }

    #[test]
    fn not_authorizable_when_cap_hit() {
        let mut token = sample_token();
        token.scan_count = 2;
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(!token.is_authorizable(now));
    }

    #[test]
    fn no_cap_means_unbounded_scans() {
        let mut token = sample_token();
        token.max_scans = None;
        token.scan_count = 1_000_000;
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(token.is_authorizable(now));
    }

    #[test]
    fn authorized_token_binds_staff_identity() {
        let token = sample_token();
        let handle = AuthorizedToken::from(&token);
        assert_eq!(handle.staff_id, "staff-1");
        assert_eq!(handle.business_id, "biz-1");
        assert_eq!(handle.token_id, "tok-1");
    }

    #[test]
    fn token_kind_text_forms() {
        assert_eq!(TokenKind::Persistent.to_string(), "PERSISTENT");
        assert_eq!(TokenKind::Shift.to_string(), "SHIFT");
    }
}
