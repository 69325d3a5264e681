// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tip ledger: creation, settlement, and refunds.
//!
//! Ordering of `create_pending` matters: the idempotency key is resolved
//! before the processor is called (a replayed request never re-charges),
//! and the charge happens before the INSERT (a processor failure leaves
//! no row behind). The same key is passed through to the processor
//! unchanged, so even a crash between charge and insert converges: the
//! client's retry gets the same payment intent back and inserts it then.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tipflow_config::model::RefundConfig;
use tipflow_core::{
    AuthorizedToken, CreateTipError, PaymentStatus, RefundError, Tip, TipflowError,
    TransitionError,
};
use tipflow_processor::{ChargeRequest, PaymentProcessor};
use tipflow_storage::{queries, Database, InsertOutcome, TransitionOutcome};
use tracing::{debug, info, warn};

/// A request to create a pending tip, carrying the authorization handle
/// the Token Authority produced.
#[derive(Debug, Clone)]
pub struct CreateTipRequest {
    pub authorized: AuthorizedToken,
    pub amount: Decimal,
    pub currency: String,
    pub idempotency_key: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub tip_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// The append-mostly store of tip transactions and their state machine.
#[derive(Clone)]
pub struct Ledger {
    db: Database,
    processor: Arc<dyn PaymentProcessor>,
    refund_window: Duration,
}

impl Ledger {
    pub fn new(db: Database, processor: Arc<dyn PaymentProcessor>, config: &RefundConfig) -> Self {
        Self {
            db,
            processor,
            refund_window: Duration::days(config.window_days),
        }
    }

    /// Create a PENDING tip and request the charge.
    ///
    /// Retried requests (same idempotency key) return the original record
    /// without touching the processor or the ledger; this path is
    /// indistinguishable from success for the caller.
    pub async fn create_pending(
        &self,
        request: CreateTipRequest,
        now: DateTime<Utc>,
    ) -> Result<Tip, CreateTipError> {
        if request.amount <= Decimal::ZERO {
            return Err(CreateTipError::InvalidAmount(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        if (request.amount * Decimal::from(100)).fract() != Decimal::ZERO {
            return Err(CreateTipError::InvalidAmount(format!(
                "amount must have at most two decimal places, got {}",
                request.amount
            )));
        }
        let currency = request.currency.clone();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CreateTipError::InvalidCurrency(currency));
        }

        if let Some(existing) =
            queries::tips::get_by_idempotency_key(&self.db, &request.idempotency_key).await?
        {
            debug!(
                tip_id = %existing.id,
                idempotency_key = %request.idempotency_key,
                "idempotent replay of create_pending"
            );
            return Ok(existing);
        }

        let intent = self
            .processor
            .create_charge(&ChargeRequest {
                amount: request.amount,
                currency: currency.clone(),
                idempotency_key: request.idempotency_key.clone(),
                description: Some(format!("Tip for staff {}", request.authorized.staff_id)),
            })
            .await
            .map_err(CreateTipError::ChargeFailed)?;

        let metadata = request
            .metadata
            .as_ref()
            .map(|value| value.to_string());
        let tip = Tip {
            id: uuid::Uuid::new_v4().to_string(),
            staff_id: request.authorized.staff_id,
            business_id: request.authorized.business_id,
            location_id: request.authorized.location_id,
            token_id: request.authorized.token_id,
            amount: request.amount,
            currency,
            payment_intent_id: intent.payment_intent_id,
            idempotency_key: request.idempotency_key,
            status: PaymentStatus::Pending,
            customer_name: request.customer_name,
            customer_email: request.customer_email,
            tip_message: request.tip_message,
            metadata,
            created_at: now,
            succeeded_at: None,
        };

        match queries::tips::insert_pending(&self.db, &tip).await? {
            InsertOutcome::Inserted(tip) => {
                info!(
                    tip_id = %tip.id,
                    staff_id = %tip.staff_id,
                    amount = %tip.amount,
                    currency = %tip.currency,
                    payment_intent_id = %tip.payment_intent_id,
                    "tip created"
                );
                Ok(tip)
            }
            InsertOutcome::Existing(existing) => {
                // A concurrent retry inserted first; its record wins.
                debug!(tip_id = %existing.id, "concurrent create_pending retry");
                Ok(existing)
            }
        }
    }

    /// Look up a tip by id.
    pub async fn get(&self, tip_id: &str) -> Result<Option<Tip>, TipflowError> {
        queries::tips::get(&self.db, tip_id).await
    }

    /// Look up a tip by its processor-assigned payment intent id.
    pub async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Tip>, TipflowError> {
        queries::tips::get_by_payment_intent(&self.db, payment_intent_id).await
    }

    /// Settle a tip: `PENDING -> SUCCEEDED`, stamping `succeeded_at`.
    pub async fn mark_succeeded(
        &self,
        tip_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<Tip, TransitionError> {
        self.apply_transition(tip_id, PaymentStatus::Succeeded, processed_at)
            .await
    }

    /// Fail a tip: `PENDING -> FAILED`.
    pub async fn mark_failed(
        &self,
        tip_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Tip, TransitionError> {
        self.apply_transition(tip_id, PaymentStatus::Failed, at).await
    }

    async fn apply_transition(
        &self,
        tip_id: &str,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<Tip, TransitionError> {
        match queries::tips::transition(&self.db, tip_id, to, at).await? {
            TransitionOutcome::Applied(tip) => {
                info!(tip_id = %tip.id, status = %tip.status, "tip transitioned");
                Ok(tip)
            }
            TransitionOutcome::NotFound => Err(TransitionError::NotFound),
            TransitionOutcome::Conflict(current) => Err(TransitionError::InvalidTransition {
                from: current,
                to,
            }),
        }
    }

    /// Whether the tip can be refunded at `now`, with a reason when not.
    pub async fn can_refund(
        &self,
        tip_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(bool, Option<String>), TipflowError> {
        let Some(tip) = queries::tips::get(&self.db, tip_id).await? else {
            return Ok((false, Some("tip not found".to_string())));
        };
        Ok(match self.refundability(&tip, now) {
            Ok(()) => (true, None),
            Err(reason) => (false, Some(reason)),
        })
    }

    fn refundability(&self, tip: &Tip, now: DateTime<Utc>) -> Result<(), String> {
        match tip.status {
            PaymentStatus::Pending => return Err("tip has not settled".to_string()),
            PaymentStatus::Failed => return Err("tip payment failed".to_string()),
            PaymentStatus::RefundPending | PaymentStatus::Refunded => {
                return Err("refund already initiated".to_string())
            }
            PaymentStatus::Succeeded => {}
        }
        let Some(succeeded_at) = tip.succeeded_at else {
            return Err("tip has no settlement timestamp".to_string());
        };
        if now - succeeded_at > self.refund_window {
            return Err("refund window expired".to_string());
        }
        Ok(())
    }

    /// Refund a settled tip.
    ///
    /// Moves to REFUND_PENDING, asks the processor, and completes to
    /// REFUNDED on confirmation. A failed refund call rolls the tip back
    /// to SUCCEEDED; it is never stranded in REFUND_PENDING.
    pub async fn initiate_refund(
        &self,
        tip_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Tip, RefundError> {
        let Some(tip) = queries::tips::get(&self.db, tip_id).await? else {
            return Err(RefundError::NotFound);
        };
        if let Err(reason) = self.refundability(&tip, now) {
            return Err(RefundError::NotRefundable { reason });
        }

        match queries::tips::transition(&self.db, tip_id, PaymentStatus::RefundPending, now)
            .await?
        {
            TransitionOutcome::Applied(_) => {}
            TransitionOutcome::NotFound => return Err(RefundError::NotFound),
            TransitionOutcome::Conflict(_) => {
                // A concurrent refund won the guard.
                return Err(RefundError::NotRefundable {
                    reason: "refund already initiated".to_string(),
                });
            }
        }

        if let Err(call_err) = self.processor.refund(&tip.payment_intent_id).await {
            warn!(
                tip_id,
                payment_intent_id = %tip.payment_intent_id,
                error = %call_err,
                "refund call failed, rolling back to SUCCEEDED"
            );
            queries::tips::rollback_refund(&self.db, tip_id).await?;
            return Err(RefundError::RefundCallFailed(call_err));
        }

        match queries::tips::transition(&self.db, tip_id, PaymentStatus::Refunded, now).await? {
            TransitionOutcome::Applied(tip) => {
                info!(tip_id = %tip.id, "tip refunded");
                Ok(tip)
            }
            other => Err(RefundError::Infra(TipflowError::Internal(format!(
                "refund completion for {tip_id} hit unexpected state: {other:?}"
            )))),
        }
    }

    /// Total and count of settled tips for one staff member in `[from, to)`.
    pub async fn tips_total_for_staff(
        &self,
        staff_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(Decimal, u32), TipflowError> {
        queries::tips::sum_succeeded_for_staff(&self.db, staff_id, from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tipflow_test_utils::MockProcessor;

    struct Fixture {
        ledger: Ledger,
        processor: Arc<MockProcessor>,
        db: Database,
    }

    async fn setup() -> Fixture {
        setup_with_window(30).await
    }

    async fn setup_with_window(window_days: i64) -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO qr_tokens (id, token, staff_id, business_id, kind, valid_from, \
                     created_at) VALUES ('tok-1', 'tok-str-1', 'staff-1', 'biz-1', 'SHIFT', \
                     '2026-03-01T00:00:00.000Z', '2026-03-01T00:00:00.000Z')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        let processor = Arc::new(MockProcessor::default());
        let ledger = Ledger::new(
            db.clone(),
            processor.clone(),
            &RefundConfig {
                window_days,
            },
        );
        Fixture {
            ledger,
            processor,
            db,
        }
    }

    fn at(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, h, 0, 0).unwrap()
    }

    fn handle() -> AuthorizedToken {
        AuthorizedToken {
            token_id: "tok-1".to_string(),
            staff_id: "staff-1".to_string(),
            business_id: "biz-1".to_string(),
            location_id: Some("loc-1".to_string()),
            scan_count: 1,
        }
    }

    fn request(amount: &str, key: &str) -> CreateTipRequest {
        CreateTipRequest {
            authorized: handle(),
            amount: amount.parse().unwrap(),
            currency: "GBP".to_string(),
            idempotency_key: key.to_string(),
            customer_name: Some("Alex".to_string()),
            customer_email: None,
            tip_message: None,
            metadata: Some(serde_json::json!({"table": 4})),
        }
    }

    #[tokio::test]
    async fn create_pending_charges_and_records() {
        let fx = setup().await;
        let tip = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 12))
            .await
            .unwrap();

        assert_eq!(tip.status, PaymentStatus::Pending);
        assert_eq!(tip.amount, "10.00".parse::<Decimal>().unwrap());
        assert_eq!(tip.payment_intent_id, "pi_0");
        assert_eq!(tip.staff_id, "staff-1");
        assert!(tip.succeeded_at.is_none());
        assert_eq!(tip.metadata.as_deref(), Some(r#"{"table":4}"#));
    }

    #[tokio::test]
    async fn same_key_twice_yields_one_row_and_same_id() {
        let fx = setup().await;
        let first = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 12))
            .await
            .unwrap();
        let second = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 13))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.payment_intent_id, second.payment_intent_id);

        let count: i64 = fx
            .db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM tips", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn non_positive_and_over_precise_amounts_are_rejected() {
        let fx = setup().await;
        for bad in ["0", "-5.00", "1.005"] {
            let err = fx
                .ledger
                .create_pending(request(bad, "k"), at(1, 12))
                .await
                .unwrap_err();
            assert!(
                matches!(err, CreateTipError::InvalidAmount(_)),
                "{bad} should be invalid"
            );
        }
        // Nothing reached the processor or the ledger.
        let count: i64 = fx
            .db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM tips", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn bad_currency_is_rejected() {
        let fx = setup().await;
        let mut req = request("10.00", "k");
        req.currency = "gbp".to_string();
        let err = fx.ledger.create_pending(req, at(1, 12)).await.unwrap_err();
        assert!(matches!(err, CreateTipError::InvalidCurrency(_)));
    }

    #[tokio::test]
    async fn charge_failure_leaves_no_row() {
        let fx = setup().await;
        fx.processor.fail_charges(true);

        let err = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 12))
            .await
            .unwrap_err();
        assert!(matches!(err, CreateTipError::ChargeFailed(_)));

        let count: i64 = fx
            .db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM tips", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 0, "a failed charge must not record a tip");
    }

    #[tokio::test]
    async fn settlement_and_double_settlement() {
        let fx = setup().await;
        let tip = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 12))
            .await
            .unwrap();

        let settled = fx.ledger.mark_succeeded(&tip.id, at(1, 13)).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Succeeded);
        assert_eq!(settled.succeeded_at, Some(at(1, 13)));

        let err = fx.ledger.mark_succeeded(&tip.id, at(1, 14)).await.unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidTransition {
                from: PaymentStatus::Succeeded,
                to: PaymentStatus::Succeeded,
            }
        ));

        // First settlement timestamp survives.
        let current = fx.ledger.get(&tip.id).await.unwrap().unwrap();
        assert_eq!(current.succeeded_at, Some(at(1, 13)));
    }

    #[tokio::test]
    async fn refund_happy_path() {
        let fx = setup().await;
        let tip = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 12))
            .await
            .unwrap();
        fx.ledger.mark_succeeded(&tip.id, at(1, 13)).await.unwrap();

        let (ok, reason) = fx.ledger.can_refund(&tip.id, at(5, 12)).await.unwrap();
        assert!(ok, "refund should be allowed, got {reason:?}");

        let refunded = fx.ledger.initiate_refund(&tip.id, at(5, 12)).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert_eq!(fx.processor.refunded_intents(), ["pi_0".to_string()]);

        // A second refund is refused.
        let err = fx.ledger.initiate_refund(&tip.id, at(5, 13)).await.unwrap_err();
        assert!(matches!(err, RefundError::NotRefundable { .. }));
    }

    #[tokio::test]
    async fn refund_window_expiry_reason() {
        let fx = setup().await;
        let tip = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 12))
            .await
            .unwrap();
        fx.ledger.mark_succeeded(&tip.id, at(1, 12)).await.unwrap();

        // 31 days after settlement with the default 30-day window.
        let late = at(1, 12) + Duration::days(31);
        let (ok, reason) = fx.ledger.can_refund(&tip.id, late).await.unwrap();
        assert!(!ok);
        assert_eq!(reason.as_deref(), Some("refund window expired"));

        let err = fx.ledger.initiate_refund(&tip.id, late).await.unwrap_err();
        assert!(matches!(
            err,
            RefundError::NotRefundable { reason } if reason == "refund window expired"
        ));
    }

    #[tokio::test]
    async fn pending_tip_is_not_refundable() {
        let fx = setup().await;
        let tip = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 12))
            .await
            .unwrap();

        let (ok, reason) = fx.ledger.can_refund(&tip.id, at(1, 13)).await.unwrap();
        assert!(!ok);
        assert_eq!(reason.as_deref(), Some("tip has not settled"));
    }

    #[tokio::test]
    async fn failed_refund_call_rolls_back_to_succeeded() {
        let fx = setup().await;
        let tip = fx
            .ledger
            .create_pending(request("10.00", "abc"), at(1, 12))
            .await
            .unwrap();
        fx.ledger.mark_succeeded(&tip.id, at(1, 13)).await.unwrap();
        fx.processor.fail_refunds(true);

        let err = fx.ledger.initiate_refund(&tip.id, at(2, 12)).await.unwrap_err();
        assert!(matches!(err, RefundError::RefundCallFailed(_)));

        let current = fx.ledger.get(&tip.id).await.unwrap().unwrap();
        assert_eq!(
            current.status,
            PaymentStatus::Succeeded,
            "tip must not strand in REFUND_PENDING"
        );
        assert_eq!(current.succeeded_at, Some(at(1, 13)));

        // Retry succeeds once the processor recovers.
        fx.processor.fail_refunds(false);
        let refunded = fx.ledger.initiate_refund(&tip.id, at(2, 13)).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn staff_totals_count_only_settled() {
        let fx = setup().await;
        let a = fx
            .ledger
            .create_pending(request("10.00", "a"), at(1, 12))
            .await
            .unwrap();
        let b = fx
            .ledger
            .create_pending(request("2.50", "b"), at(1, 12))
            .await
            .unwrap();
        let _pending = fx
            .ledger
            .create_pending(request("99.00", "c"), at(1, 12))
            .await
            .unwrap();
        fx.ledger.mark_succeeded(&a.id, at(1, 13)).await.unwrap();
        fx.ledger.mark_succeeded(&b.id, at(1, 14)).await.unwrap();

        let (total, count) = fx
            .ledger
            .tips_total_for_staff("staff-1", at(1, 0), at(2, 0))
            .await
            .unwrap();
        assert_eq!(total, "12.50".parse::<Decimal>().unwrap());
        assert_eq!(count, 2);
    }
}
