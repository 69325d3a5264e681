// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Tipflow settlement engine.
//!
//! Three route groups: public customer-facing endpoints (scan, tip
//! creation), the signed webhook endpoint (authenticity comes from the
//! signature, not from bearer auth), and operator endpoints behind
//! bearer auth (refunds, summaries, event remediation). Response codes
//! follow the error taxonomy: idempotent replays and benign no-ops are
//! indistinguishable from success, transient storage failures return 503
//! so the provider's retry policy engages.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{build_router, start_server, GatewayState, ServerConfig};
