// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tip ledger operations.
//!
//! This module is the write boundary that enforces tip immutability:
//! after the INSERT, no UPDATE statement here ever names `amount`,
//! `staff_id`, or `payment_intent_id`. Only `status` and `succeeded_at`
//! can move, and always behind a status guard so concurrent transition
//! attempts are serialized per record.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use rust_decimal::Decimal;
use tipflow_core::{PaymentStatus, SummaryScope, ScopeKind, Tip};

use crate::codec::{opt_ts, parse_opt_text, parse_text, ts};
use crate::database::{map_tr_err, Database};

const TIP_COLUMNS: &str = "id, staff_id, business_id, location_id, token_id, amount, currency, \
     payment_intent_id, idempotency_key, status, customer_name, customer_email, tip_message, \
     metadata, created_at, succeeded_at";

fn row_to_tip(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tip> {
    Ok(Tip {
        id: row.get(0)?,
        staff_id: row.get(1)?,
        business_id: row.get(2)?,
        location_id: row.get(3)?,
        token_id: row.get(4)?,
        amount: parse_text(5, row.get(5)?)?,
        currency: row.get(6)?,
        payment_intent_id: row.get(7)?,
        idempotency_key: row.get(8)?,
        status: parse_text(9, row.get(9)?)?,
        customer_name: row.get(10)?,
        customer_email: row.get(11)?,
        tip_message: row.get(12)?,
        metadata: row.get(13)?,
        created_at: parse_text(14, row.get(14)?)?,
        succeeded_at: parse_opt_text(15, row.get(15)?)?,
    })
}

fn select_tip(
    conn: &rusqlite::Connection,
    where_clause: &str,
    key: &str,
) -> rusqlite::Result<Option<Tip>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TIP_COLUMNS} FROM tips WHERE {where_clause} = ?1"
    ))?;
    match stmt.query_row(params![key], row_to_tip) {
        Ok(tip) => Ok(Some(tip)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Result of an idempotency-aware insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// A new row was written.
    Inserted(Tip),
    /// A row with this idempotency key already existed; it is returned
    /// unchanged and nothing was written.
    Existing(Tip),
}

/// Insert a pending tip unless its idempotency key is already taken.
///
/// The check and the insert share one transaction, so two concurrent
/// retries of the same request cannot both insert.
pub async fn insert_pending(
    db: &Database,
    tip: &Tip,
) -> Result<InsertOutcome, tipflow_core::TipflowError> {
    let tip = tip.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            if let Some(existing) = select_tip(&tx, "idempotency_key", &tip.idempotency_key)? {
                tx.commit()?;
                return Ok(InsertOutcome::Existing(existing));
            }

            tx.execute(
                "INSERT INTO tips (id, staff_id, business_id, location_id, token_id, amount, \
                 currency, payment_intent_id, idempotency_key, status, customer_name, \
                 customer_email, tip_message, metadata, created_at, succeeded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    tip.id,
                    tip.staff_id,
                    tip.business_id,
                    tip.location_id,
                    tip.token_id,
                    tip.amount.to_string(),
                    tip.currency,
                    tip.payment_intent_id,
                    tip.idempotency_key,
                    tip.status.to_string(),
                    tip.customer_name,
                    tip.customer_email,
                    tip.tip_message,
                    tip.metadata,
                    ts(tip.created_at),
                    opt_ts(tip.succeeded_at),
                ],
            )?;
            tx.commit()?;
            Ok(InsertOutcome::Inserted(tip))
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a tip by id.
pub async fn get(db: &Database, tip_id: &str) -> Result<Option<Tip>, tipflow_core::TipflowError> {
    let tip_id = tip_id.to_string();
    db.connection()
        .call(move |conn| select_tip(conn, "id", &tip_id))
        .await
        .map_err(map_tr_err)
}

/// Look up a tip by its caller-supplied idempotency key.
pub async fn get_by_idempotency_key(
    db: &Database,
    key: &str,
) -> Result<Option<Tip>, tipflow_core::TipflowError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| select_tip(conn, "idempotency_key", &key))
        .await
        .map_err(map_tr_err)
}

/// Look up a tip by the processor-assigned payment intent id.
pub async fn get_by_payment_intent(
    db: &Database,
    payment_intent_id: &str,
) -> Result<Option<Tip>, tipflow_core::TipflowError> {
    let payment_intent_id = payment_intent_id.to_string();
    db.connection()
        .call(move |conn| select_tip(conn, "payment_intent_id", &payment_intent_id))
        .await
        .map_err(map_tr_err)
}

/// Result of a guarded status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The transition was applied; the post-transition row is returned.
    Applied(Tip),
    /// No tip with that id exists.
    NotFound,
    /// The move is not legal from the tip's current status. The current
    /// status is returned so the caller can decide whether the conflict
    /// is benign (duplicate webhook) or a real error.
    Conflict(PaymentStatus),
}

/// Attempt to move a tip to `to`, setting `succeeded_at` when `to` is
/// SUCCEEDED.
///
/// Legality comes from [`PaymentStatus::can_transition`]; the UPDATE is
/// additionally guarded on the status the row was read with, so exactly
/// one of several racing transition attempts wins.
pub async fn transition(
    db: &Database,
    tip_id: &str,
    to: PaymentStatus,
    at: DateTime<Utc>,
) -> Result<TransitionOutcome, tipflow_core::TipflowError> {
    let tip_id = tip_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let Some(tip) = select_tip(&tx, "id", &tip_id)? else {
                tx.commit()?;
                return Ok(TransitionOutcome::NotFound);
            };

            if !tip.status.can_transition(to) {
                tx.commit()?;
                return Ok(TransitionOutcome::Conflict(tip.status));
            }

            let succeeded_at = if to == PaymentStatus::Succeeded {
                Some(ts(at))
            } else {
                None
            };
            let changed = tx.execute(
                "UPDATE tips SET status = ?2, \
                     succeeded_at = COALESCE(?3, succeeded_at) \
                 WHERE id = ?1 AND status = ?4",
                params![tip_id, to.to_string(), succeeded_at, tip.status.to_string()],
            )?;
            if changed == 0 {
                // A concurrent transition got there first; re-read for the
                // caller's benefit.
                let current = select_tip(&tx, "id", &tip_id)?
                    .map(|t| t.status)
                    .unwrap_or(tip.status);
                tx.commit()?;
                return Ok(TransitionOutcome::Conflict(current));
            }

            let updated = select_tip(&tx, "id", &tip_id)?.ok_or(
                rusqlite::Error::QueryReturnedNoRows,
            )?;
            tx.commit()?;
            Ok(TransitionOutcome::Applied(updated))
        })
        .await
        .map_err(map_tr_err)
}

/// Compensating write for a failed refund call: put a REFUND_PENDING tip
/// back to SUCCEEDED without touching `succeeded_at`.
///
/// This is deliberately not expressible through [`transition`]; the state
/// machine has no backward edges.
pub async fn rollback_refund(
    db: &Database,
    tip_id: &str,
) -> Result<bool, tipflow_core::TipflowError> {
    let tip_id = tip_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE tips SET status = 'SUCCEEDED' \
                 WHERE id = ?1 AND status = 'REFUND_PENDING'",
                params![tip_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Sum and count of settled tips for one staff member in `[from, to)`.
///
/// Amounts are folded in Rust: SQLite's SUM would coerce the TEXT
/// decimals to floating point.
pub async fn sum_succeeded_for_staff(
    db: &Database,
    staff_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<(Decimal, u32), tipflow_core::TipflowError> {
    let staff_id = staff_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT amount FROM tips \
                 WHERE staff_id = ?1 AND status = 'SUCCEEDED' \
                   AND succeeded_at >= ?2 AND succeeded_at < ?3",
            )?;
            let rows = stmt.query_map(params![staff_id, ts(from), ts(to)], |row| {
                parse_text::<Decimal>(0, row.get(0)?)
            })?;
            let mut total = Decimal::ZERO;
            let mut count = 0u32;
            for row in rows {
                total += row?;
                count += 1;
            }
            Ok((total, count))
        })
        .await
        .map_err(map_tr_err)
}

/// Amount and currency of every settled tip in a scope on a settlement
/// date. Input for summary recalculation.
pub async fn settled_amounts_for_scope_date(
    db: &Database,
    scope: &SummaryScope,
    date: NaiveDate,
) -> Result<Vec<(Decimal, String)>, tipflow_core::TipflowError> {
    let scope_column = match scope.kind {
        ScopeKind::Business => "business_id",
        ScopeKind::Location => "location_id",
        ScopeKind::Staff => "staff_id",
    };
    let scope_id = scope.id.clone();
    let date = date.to_string();
    let sql = format!(
        "SELECT amount, currency FROM tips \
         WHERE {scope_column} = ?1 AND status = 'SUCCEEDED' \
           AND date(succeeded_at) = ?2"
    );
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![scope_id, date], |row| {
                Ok((parse_text::<Decimal>(0, row.get(0)?)?, row.get::<_, String>(1)?))
            })?;
            let mut amounts = Vec::new();
            for row in rows {
                amounts.push(row?);
            }
            Ok(amounts)
        })
        .await
        .map_err(map_tr_err)
}
