// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete settlement pipeline.
//!
//! Each test creates an isolated TestHarness with a temp SQLite database
//! and a scripted mock processor. Tests are independent and
//! order-insensitive.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tipflow_core::{AuthError, AuthorizeError, PaymentStatus, RefundError, SummaryScope};
use tipflow_engine::{CreateTipRequest, ReconcileOutcome};
use tipflow_test_utils::TestHarness;

fn at(day: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, h, 0, 0).unwrap()
}

fn tip_request(harness_token: &tipflow_core::AuthorizedToken, key: &str, amount: &str) -> CreateTipRequest {
    CreateTipRequest {
        authorized: harness_token.clone(),
        amount: amount.parse().unwrap(),
        currency: "GBP".to_string(),
        idempotency_key: key.to_string(),
        customer_name: Some("Alex".to_string()),
        customer_email: Some("alex@example.com".to_string()),
        tip_message: Some("cheers!".to_string()),
        metadata: None,
    }
}

fn success_event(payment_intent_id: &str) -> String {
    TestHarness::payment_event_payload("payment_intent.succeeded", payment_intent_id)
}

// ---- Scan to settlement to summary ----

#[tokio::test]
async fn scan_tip_settle_summarize() {
    let harness = TestHarness::builder().build().await.unwrap();
    let now = at(1, 12);

    // Customer scans, tips, and the processor confirms twice (duplicate
    // delivery through the webhook feed).
    let token = harness.issue_shift_token(now, None).await.unwrap();
    let handle = harness.tokens.authorize(&token.token, now).await.unwrap();
    let tip = harness
        .ledger
        .create_pending(tip_request(&handle, "abc", "10.00"), now)
        .await
        .unwrap();
    assert_eq!(tip.status, PaymentStatus::Pending);

    let payload = success_event(&tip.payment_intent_id);
    let first = harness
        .reconciler
        .receive("evt_1", "payment_intent.succeeded", &payload, at(1, 13))
        .await
        .unwrap();
    assert_eq!(first, ReconcileOutcome::Applied);
    let second = harness
        .reconciler
        .receive("evt_1", "payment_intent.succeeded", &payload, at(1, 14))
        .await
        .unwrap();
    assert_eq!(second, ReconcileOutcome::Replay);

    // Exactly one settlement, first timestamp wins.
    let settled = harness.ledger.get(&tip.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Succeeded);
    assert_eq!(settled.succeeded_at, Some(at(1, 13)));

    // The rollup reflects the ledger for every scope.
    for scope in [
        SummaryScope::staff("staff-1"),
        SummaryScope::location("loc-1"),
        SummaryScope::business("biz-1"),
    ] {
        let summary = harness
            .summaries
            .recalculate(&scope, at(1, 13).date_naive(), at(1, 23))
            .await
            .unwrap();
        assert_eq!(summary.total_tips, "10.00".parse::<Decimal>().unwrap());
        assert_eq!(summary.tip_count, 1);
    }
}

// ---- Single-use token ----

#[tokio::test]
async fn single_use_token_admits_exactly_one_tip_flow() {
    let harness = TestHarness::builder().build().await.unwrap();
    let now = at(1, 12);

    let token = harness.issue_shift_token(now, Some(1)).await.unwrap();

    let handle = harness.tokens.authorize(&token.token, now).await.unwrap();
    assert_eq!(handle.scan_count, 1);

    let err = harness.tokens.authorize(&token.token, now).await.unwrap_err();
    assert!(matches!(
        err,
        AuthorizeError::Rejected(AuthError::ScanLimitReached)
    ));
}

// ---- Client retries cannot double-charge ----

#[tokio::test]
async fn retried_tip_creation_charges_once() {
    let harness = TestHarness::builder().build().await.unwrap();
    let now = at(1, 12);
    let token = harness.issue_shift_token(now, None).await.unwrap();
    let handle = harness.tokens.authorize(&token.token, now).await.unwrap();

    let first = harness
        .ledger
        .create_pending(tip_request(&handle, "abc", "10.00"), now)
        .await
        .unwrap();
    let retry = harness
        .ledger
        .create_pending(tip_request(&handle, "abc", "10.00"), at(1, 13))
        .await
        .unwrap();

    assert_eq!(first.id, retry.id);
    assert_eq!(harness.processor.charge_count(), 1, "one charge per key");
}

// ---- Failure path ----

#[tokio::test]
async fn failed_payment_never_reaches_the_summary() {
    let harness = TestHarness::builder().build().await.unwrap();
    let now = at(1, 12);
    let token = harness.issue_shift_token(now, None).await.unwrap();
    let handle = harness.tokens.authorize(&token.token, now).await.unwrap();
    let tip = harness
        .ledger
        .create_pending(tip_request(&handle, "abc", "10.00"), now)
        .await
        .unwrap();

    let payload =
        TestHarness::payment_event_payload("payment_intent.payment_failed", &tip.payment_intent_id);
    harness
        .reconciler
        .receive("evt_1", "payment_intent.payment_failed", &payload, at(1, 13))
        .await
        .unwrap();

    let failed = harness.ledger.get(&tip.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);

    // A late success for the same intent is benign and changes nothing.
    let outcome = harness
        .reconciler
        .receive(
            "evt_2",
            "payment_intent.succeeded",
            &success_event(&tip.payment_intent_id),
            at(1, 14),
        )
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::BenignNoOp);
    let still_failed = harness.ledger.get(&tip.id).await.unwrap().unwrap();
    assert_eq!(still_failed.status, PaymentStatus::Failed);

    let summary = harness
        .summaries
        .recalculate(&SummaryScope::staff("staff-1"), at(1, 13).date_naive(), at(1, 23))
        .await
        .unwrap();
    assert_eq!(summary.tip_count, 0);
}

// ---- Refund lifecycle ----

#[tokio::test]
async fn refund_within_window_and_rejection_after() {
    let harness = TestHarness::builder().build().await.unwrap();
    let now = at(1, 12);
    let token = harness.issue_shift_token(now, None).await.unwrap();
    let handle = harness.tokens.authorize(&token.token, now).await.unwrap();

    // Two settled tips.
    let refundable = harness
        .ledger
        .create_pending(tip_request(&handle, "a", "10.00"), now)
        .await
        .unwrap();
    let stale = harness
        .ledger
        .create_pending(tip_request(&handle, "b", "5.00"), now)
        .await
        .unwrap();
    for tip in [&refundable, &stale] {
        harness
            .reconciler
            .receive(
                &format!("evt_{}", tip.id),
                "payment_intent.succeeded",
                &success_event(&tip.payment_intent_id),
                at(1, 13),
            )
            .await
            .unwrap();
    }

    // Within the 30-day window: refund completes.
    let refunded = harness
        .ledger
        .initiate_refund(&refundable.id, at(10, 12))
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(
        harness.processor.refunded_intents(),
        [refundable.payment_intent_id.clone()]
    );

    // 31 days after settlement: rejected with the window reason.
    let late = at(1, 13) + Duration::days(31);
    let (ok, reason) = harness.ledger.can_refund(&stale.id, late).await.unwrap();
    assert!(!ok);
    assert_eq!(reason.as_deref(), Some("refund window expired"));
    let err = harness
        .ledger
        .initiate_refund(&stale.id, late)
        .await
        .unwrap_err();
    assert!(matches!(err, RefundError::NotRefundable { .. }));

    // The refunded tip no longer counts toward the rollup.
    let summary = harness
        .summaries
        .recalculate(&SummaryScope::staff("staff-1"), at(1, 13).date_naive(), late)
        .await
        .unwrap();
    assert_eq!(summary.total_tips, "5.00".parse::<Decimal>().unwrap());
    assert_eq!(summary.tip_count, 1);
}

// ---- Crash recovery: orphan event replay ----

#[tokio::test]
async fn orphaned_settlement_recovers_via_replay_sweep() {
    let harness = TestHarness::builder().build().await.unwrap();
    let now = at(1, 12);
    let token = harness.issue_shift_token(now, None).await.unwrap();
    let handle = harness.tokens.authorize(&token.token, now).await.unwrap();

    // The success event lands before the tip row exists (charge happened,
    // insert was lost to a crash).
    let payload = success_event("pi_0");
    assert!(harness
        .reconciler
        .receive("evt_1", "payment_intent.succeeded", &payload, at(1, 13))
        .await
        .is_err());

    // Client retry recreates the tip; the shared idempotency key gives it
    // the same payment intent.
    let tip = harness
        .ledger
        .create_pending(tip_request(&handle, "abc", "10.00"), at(1, 14))
        .await
        .unwrap();
    assert_eq!(tip.payment_intent_id, "pi_0");

    // Operator sweep settles it.
    let sweep = harness.reconciler.replay_unprocessed(at(1, 15)).await.unwrap();
    assert_eq!(sweep.resolved, 1);
    assert_eq!(sweep.still_failing, 0);

    let settled = harness.ledger.get(&tip.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Succeeded);
}

// ---- Staff-wide revocation mid-flow ----

#[tokio::test]
async fn deactivated_staff_tokens_stop_authorizing_but_pending_tips_settle() {
    let harness = TestHarness::builder().build().await.unwrap();
    let now = at(1, 12);
    let token = harness.issue_shift_token(now, None).await.unwrap();
    let handle = harness.tokens.authorize(&token.token, now).await.unwrap();
    let tip = harness
        .ledger
        .create_pending(tip_request(&handle, "abc", "10.00"), now)
        .await
        .unwrap();

    // Staff leaves; all their tokens die.
    harness.tokens.revoke_all_for_staff("staff-1").await.unwrap();
    let err = harness.tokens.authorize(&token.token, at(1, 13)).await.unwrap_err();
    assert!(matches!(err, AuthorizeError::Rejected(AuthError::Inactive)));

    // The in-flight payment still settles; the ledger is append-only.
    let outcome = harness
        .reconciler
        .receive(
            "evt_1",
            "payment_intent.succeeded",
            &success_event(&tip.payment_intent_id),
            at(1, 14),
        )
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);
}
