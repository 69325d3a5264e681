// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound payment-processor integration.
//!
//! The engine talks to the external processor through the
//! [`PaymentProcessor`] trait: one call to create a charge (carrying the
//! caller's idempotency key through unchanged) and one to request a
//! refund. [`HttpProcessor`] is the production implementation; tests use
//! the scripted mock in `tipflow-test-utils`.
//!
//! Inbound authenticity lives in [`signature`]: Stripe-style
//! `t=...,v1=...` HMAC verification with a replay tolerance window.

pub mod client;
pub mod signature;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tipflow_core::TipflowError;

pub use client::HttpProcessor;
pub use signature::{verify_signature, SignatureError};

/// A request to charge a customer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    /// Positive fixed-point amount in major units (e.g. "10.00").
    pub amount: Decimal,
    /// Three-letter uppercase currency code.
    pub currency: String,
    /// Caller-supplied idempotency key, passed through unchanged so
    /// processor-side retries cannot double-charge.
    pub idempotency_key: String,
    /// Human-readable statement line.
    pub description: Option<String>,
}

/// The processor's answer to a charge request. The definitive outcome
/// arrives later over the webhook feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeIntent {
    /// Processor-assigned payment intent id; globally unique.
    pub payment_intent_id: String,
    /// Processor-side status at creation time (informational only).
    pub status: String,
}

/// The external payment processor, seen from the engine.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Request a charge. A timeout or transport failure means the outcome
    /// is unknown, never "failed": the ledger stays in its pre-call state
    /// and the webhook feed resolves it.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeIntent, TipflowError>;

    /// Request a refund of the full charge behind `payment_intent_id`.
    async fn refund(&self, payment_intent_id: &str) -> Result<(), TipflowError>;
}
