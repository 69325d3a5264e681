// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event log operations.
//!
//! The event log is the idempotency barrier for the reconciler: the
//! UNIQUE constraint on `event_id` makes insert-or-detect a single
//! statement, and the `processed` flag is only ever set after the ledger
//! mutation it records has committed.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tipflow_core::WebhookEvent;

use crate::codec::{opt_ts, parse_opt_text, parse_text, ts};
use crate::database::{map_tr_err, Database};

const EVENT_COLUMNS: &str =
    "id, event_id, event_type, payload, processed, processed_at, created_at";

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<WebhookEvent> {
    Ok(WebhookEvent {
        id: row.get(0)?,
        event_id: row.get(1)?,
        event_type: row.get(2)?,
        payload: row.get(3)?,
        processed: row.get(4)?,
        processed_at: parse_opt_text(5, row.get(5)?)?,
        created_at: parse_text(6, row.get(6)?)?,
    })
}

/// Record an event unless its processor id was already seen.
///
/// Returns `true` when the row was newly inserted, `false` on a replay.
/// `INSERT OR IGNORE` against the UNIQUE `event_id` makes this a single
/// atomic step.
pub async fn insert_if_new(
    db: &Database,
    event: &WebhookEvent,
) -> Result<bool, tipflow_core::TipflowError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO webhook_events \
                 (id, event_id, event_type, payload, processed, processed_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id,
                    event.event_id,
                    event.event_type,
                    event.payload,
                    event.processed,
                    opt_ts(event.processed_at),
                    ts(event.created_at),
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up an event by the processor's event id.
pub async fn get_by_event_id(
    db: &Database,
    event_id: &str,
) -> Result<Option<WebhookEvent>, tipflow_core::TipflowError> {
    let event_id = event_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM webhook_events WHERE event_id = ?1"
            ))?;
            match stmt.query_row(params![event_id], row_to_event) {
                Ok(event) => Ok(Some(event)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Flip an event to processed with a timestamp. Final step of
/// reconciliation, after the ledger mutation is durably committed.
pub async fn mark_processed(
    db: &Database,
    event_id: &str,
    at: DateTime<Utc>,
) -> Result<(), tipflow_core::TipflowError> {
    let event_id = event_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE webhook_events SET processed = 1, processed_at = ?2 \
                 WHERE event_id = ?1",
                params![event_id, ts(at)],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Events awaiting operator attention or redelivery, oldest first.
pub async fn list_unprocessed(
    db: &Database,
) -> Result<Vec<WebhookEvent>, tipflow_core::TipflowError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM webhook_events \
                 WHERE processed = 0 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map([], row_to_event)?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}
