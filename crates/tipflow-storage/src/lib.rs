// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Tipflow settlement engine.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer
//! concurrency model via `tokio-rusqlite`. The four tables (qr_tokens,
//! tips, webhook_events, tip_summaries) carry their uniqueness
//! constraints in the schema; every multi-step mutation runs inside an
//! explicit transaction, and racy updates (scan consumption, status
//! transitions) are guarded conditional UPDATEs whose affected-row count
//! decides the winner.

pub mod database;
pub mod migrations;
pub mod queries;

mod codec;

pub use database::Database;
pub use queries::tips::{InsertOutcome, TransitionOutcome};
