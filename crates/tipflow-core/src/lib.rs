// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tipflow settlement engine.
//!
//! This crate defines the domain model shared across the workspace: the
//! QR token and tip records, the closed payment state machine, and the
//! error taxonomy. It performs no I/O; persistence and transport live in
//! `tipflow-storage` and `tipflow-gateway`.

pub mod error;
pub mod status;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{
    AuthError, AuthorizeError, CreateTipError, ReconcileError, RefundError, TipflowError,
    TransitionError,
};
pub use status::PaymentStatus;
pub use types::{
    AuthorizedToken, QrToken, ScanOutcome, ScopeKind, SummaryScope, Tip, TipSummary, TokenKind,
    WebhookEvent,
};
