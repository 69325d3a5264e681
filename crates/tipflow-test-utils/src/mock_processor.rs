// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted payment processor double.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tipflow_core::TipflowError;
use tipflow_processor::{ChargeIntent, ChargeRequest, PaymentProcessor};

/// In-memory [`PaymentProcessor`] with processor-side idempotency:
/// repeated charges with the same key return the same intent, the way
/// the real processor would. Failure injection via the `fail_*` flags.
#[derive(Default)]
pub struct MockProcessor {
    counter: AtomicU64,
    intents_by_key: Mutex<HashMap<String, ChargeIntent>>,
    fail_charges: AtomicBool,
    fail_refunds: AtomicBool,
    refunds: Mutex<Vec<String>>,
}

impl MockProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent charge call fail.
    pub fn fail_charges(&self, fail: bool) {
        self.fail_charges.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent refund call fail.
    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Payment intents refunded so far, in call order.
    pub fn refunded_intents(&self) -> Vec<String> {
        self.refunds.lock().unwrap().clone()
    }

    /// Number of distinct charges created.
    pub fn charge_count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeIntent, TipflowError> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(TipflowError::Processor {
                message: "charge rejected by test script".to_string(),
                source: None,
            });
        }
        let mut intents = self.intents_by_key.lock().unwrap();
        let intent = intents
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                ChargeIntent {
                    payment_intent_id: format!("pi_{n}"),
                    status: "requires_confirmation".to_string(),
                }
            });
        Ok(intent.clone())
    }

    async fn refund(&self, payment_intent_id: &str) -> Result<(), TipflowError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(TipflowError::Processor {
                message: "refund rejected by test script".to_string(),
                source: None,
            });
        }
        self.refunds
            .lock()
            .unwrap()
            .push(payment_intent_id.to_string());
        Ok(())
    }
}
