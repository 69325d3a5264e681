// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tipflow settlement engine.
//!
//! Two layers: [`TipflowError`] covers infrastructure failures (storage,
//! processor transport, configuration) and carries boxed sources; the
//! domain enums ([`AuthError`], [`TransitionError`], [`RefundError`],
//! [`ReconcileError`], [`CreateTipError`]) are closed sets that callers
//! match on. Idempotency collisions and duplicate webhook deliveries are
//! deliberately NOT errors anywhere in this module.

use thiserror::Error;

use crate::status::PaymentStatus;

/// The primary infrastructure error used across storage, processor, and
/// gateway operations.
#[derive(Debug, Error)]
pub enum TipflowError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Payment processor errors (charge/refund call failure, bad response).
    #[error("processor error: {message}")]
    Processor {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out. The ledger is left in its pre-call state;
    /// resolution comes from the webhook feed, never from guessing.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Why a presented token cannot authorize a tip right now.
///
/// None of these variants mutate state: a rejected scan leaves the token
/// exactly as it was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token with that string exists.
    #[error("token not found")]
    NotFound,

    /// The token has been revoked or auto-deactivated.
    #[error("token is inactive")]
    Inactive,

    /// The validity window has not opened yet.
    #[error("token is not yet valid")]
    NotYetValid,

    /// The validity window has closed.
    #[error("token has expired")]
    Expired,

    /// The scan cap has been reached.
    #[error("token scan limit reached")]
    ScanLimitReached,
}

/// Outcome of a failed authorization attempt: either a domain rejection
/// (no state was mutated) or an infrastructure failure.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error(transparent)]
    Rejected(#[from] AuthError),

    #[error(transparent)]
    Infra(#[from] TipflowError),
}

/// A rejected payment-status transition.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// No tip with that id exists.
    #[error("tip not found")]
    NotFound,

    /// The requested move is not in the transition table. In the webhook
    /// path this is benign (duplicate delivery) and must be swallowed.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error(transparent)]
    Infra(#[from] TipflowError),
}

/// Failures creating a pending tip. A duplicate idempotency key is not
/// here: the existing record is returned as a success.
#[derive(Debug, Error)]
pub enum CreateTipError {
    /// Amount must be strictly positive with at most two decimal places.
    #[error("invalid tip amount: {0}")]
    InvalidAmount(String),

    /// Currency must be a three-letter uppercase ISO code.
    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),

    /// The charge request to the external processor failed. No ledger row
    /// was written.
    #[error("charge request failed: {0}")]
    ChargeFailed(#[source] TipflowError),

    #[error(transparent)]
    Infra(#[from] TipflowError),
}

/// Failures initiating a refund.
#[derive(Debug, Error)]
pub enum RefundError {
    /// No tip with that id exists.
    #[error("tip not found")]
    NotFound,

    /// The tip does not satisfy the refund policy; the reason is suitable
    /// for display to an operator.
    #[error("tip is not refundable: {reason}")]
    NotRefundable { reason: String },

    /// The refund call to the external processor failed. The tip has been
    /// rolled back to SUCCEEDED and may be retried.
    #[error("refund call failed: {0}")]
    RefundCallFailed(#[source] TipflowError),

    #[error(transparent)]
    Infra(#[from] TipflowError),
}

/// Failures reconciling an inbound webhook event.
///
/// `Infra` is transient: the event stays unprocessed and the transport is
/// expected to retry delivery. The other variants are terminal for that
/// event and require operator attention.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The event references a payment intent with no matching tip. The
    /// event is recorded but left unprocessed for replay after
    /// investigation.
    #[error("no tip matches payment intent {payment_intent_id}")]
    OrphanEvent { payment_intent_id: String },

    /// The payload could not be interpreted for its declared event type.
    #[error("malformed event payload: {detail}")]
    MalformedPayload { detail: String },

    #[error(transparent)]
    Infra(#[from] TipflowError),
}
