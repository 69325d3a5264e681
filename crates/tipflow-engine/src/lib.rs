// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Tipflow settlement engine.
//!
//! Four components, leaves first: [`TokenAuthority`] owns QR token
//! lifecycle and scan-count enforcement; [`Ledger`] drives tips through
//! the irreversible payment state machine; [`Reconciler`] applies inbound
//! webhook events to the ledger with at-most-once effect; and
//! [`SummaryAggregator`] keeps the daily rollup cache consistent with the
//! ledger. All of them are thin async services over `tipflow-storage`;
//! nothing here holds in-process mutable state, so the engine is safe
//! under true request-handler parallelism.

pub mod ledger;
pub mod reconcile;
pub mod summary;
pub mod token;

pub use ledger::{CreateTipRequest, Ledger};
pub use reconcile::{ReconcileOutcome, Reconciler, ReplaySweep};
pub use summary::SummaryAggregator;
pub use token::{IssueTokenRequest, TokenAuthority};
