// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR token operations.
//!
//! Scan consumption is the concurrency-sensitive path: the increment and
//! the cap check are one guarded UPDATE, so of two racing scans on a
//! token with one remaining scan, exactly one wins and the other reads an
//! affected-row count of zero.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tipflow_core::{AuthError, QrToken, ScanOutcome};

use crate::codec::{opt_ts, parse_opt_text, parse_text, ts};
use crate::database::{map_tr_err, Database};

const TOKEN_COLUMNS: &str = "id, token, staff_id, business_id, location_id, kind, shift_id, \
     valid_from, valid_until, scan_count, max_scans, active, created_at, last_scanned_at";

fn row_to_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<QrToken> {
    Ok(QrToken {
        id: row.get(0)?,
        token: row.get(1)?,
        staff_id: row.get(2)?,
        business_id: row.get(3)?,
        location_id: row.get(4)?,
        kind: parse_text(5, row.get(5)?)?,
        shift_id: row.get(6)?,
        valid_from: parse_text(7, row.get(7)?)?,
        valid_until: parse_opt_text(8, row.get(8)?)?,
        scan_count: row.get(9)?,
        max_scans: row.get(10)?,
        active: row.get(11)?,
        created_at: parse_text(12, row.get(12)?)?,
        last_scanned_at: parse_opt_text(13, row.get(13)?)?,
    })
}

/// Insert a freshly minted token.
pub async fn insert(db: &Database, token: &QrToken) -> Result<(), tipflow_core::TipflowError> {
    let token = token.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO qr_tokens (id, token, staff_id, business_id, location_id, kind, \
                 shift_id, valid_from, valid_until, scan_count, max_scans, active, created_at, \
                 last_scanned_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    token.id,
                    token.token,
                    token.staff_id,
                    token.business_id,
                    token.location_id,
                    token.kind.to_string(),
                    token.shift_id,
                    ts(token.valid_from),
                    opt_ts(token.valid_until),
                    token.scan_count,
                    token.max_scans,
                    token.active,
                    ts(token.created_at),
                    opt_ts(token.last_scanned_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a token by its opaque string.
pub async fn get_by_token(
    db: &Database,
    token_string: &str,
) -> Result<Option<QrToken>, tipflow_core::TipflowError> {
    let token_string = token_string.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TOKEN_COLUMNS} FROM qr_tokens WHERE token = ?1"
            ))?;
            let result = stmt.query_row(params![token_string], row_to_token);
            match result {
                Ok(token) => Ok(Some(token)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a token by id.
pub async fn get(
    db: &Database,
    token_id: &str,
) -> Result<Option<QrToken>, tipflow_core::TipflowError> {
    let token_id = token_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TOKEN_COLUMNS} FROM qr_tokens WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![token_id], row_to_token);
            match result {
                Ok(token) => Ok(Some(token)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Attempt to consume one scan of the token at `now`.
///
/// The whole check-and-increment runs in one transaction. The cap check
/// is repeated in the UPDATE's WHERE clause, and auto-deactivation on
/// reaching the cap is folded into the same statement, so there is no
/// window in which a second scan can observe the pre-increment count.
pub async fn consume_scan(
    db: &Database,
    token_string: &str,
    now: DateTime<Utc>,
) -> Result<ScanOutcome, tipflow_core::TipflowError> {
    let token_string = token_string.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let found = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {TOKEN_COLUMNS} FROM qr_tokens WHERE token = ?1"
                ))?;
                match stmt.query_row(params![token_string], row_to_token) {
                    Ok(token) => Some(token),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                }
            };

            let Some(token) = found else {
                tx.commit()?;
                return Ok(ScanOutcome::Rejected(AuthError::NotFound));
            };

            // The cap check comes before the active check: a token that
            // auto-deactivated by reaching max_scans must report
            // ScanLimitReached, not Inactive.
            if token.max_scans.is_some_and(|max| token.scan_count >= max) {
                tx.commit()?;
                return Ok(ScanOutcome::Rejected(AuthError::ScanLimitReached));
            }
            if !token.active {
                tx.commit()?;
                return Ok(ScanOutcome::Rejected(AuthError::Inactive));
            }
            if now < token.valid_from {
                tx.commit()?;
                return Ok(ScanOutcome::Rejected(AuthError::NotYetValid));
            }
            if token.valid_until.is_some_and(|until| now >= until) {
                tx.commit()?;
                return Ok(ScanOutcome::Rejected(AuthError::Expired));
            }

            // Guarded increment. Deactivation on reaching the cap happens
            // in the same statement; an affected count of zero means a
            // concurrent scan took the last slot first.
            let changed = tx.execute(
                "UPDATE qr_tokens SET \
                     scan_count = scan_count + 1, \
                     last_scanned_at = ?2, \
                     active = CASE \
                         WHEN max_scans IS NOT NULL AND scan_count + 1 >= max_scans THEN 0 \
                         ELSE active \
                     END \
                 WHERE id = ?1 AND active = 1 \
                   AND (max_scans IS NULL OR scan_count < max_scans)",
                params![token.id, ts(now)],
            )?;

            if changed == 0 {
                tx.commit()?;
                return Ok(ScanOutcome::Rejected(AuthError::ScanLimitReached));
            }

            let updated = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {TOKEN_COLUMNS} FROM qr_tokens WHERE id = ?1"
                ))?;
                stmt.query_row(params![token.id], row_to_token)?
            };
            tx.commit()?;
            Ok(ScanOutcome::Authorized(updated))
        })
        .await
        .map_err(map_tr_err)
}

/// Deactivate a token. Idempotent: returns `false` when it was already
/// inactive.
pub async fn revoke(db: &Database, token_id: &str) -> Result<bool, tipflow_core::TipflowError> {
    let token_id = token_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE qr_tokens SET active = 0 WHERE id = ?1 AND active = 1",
                params![token_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Deactivate every token owned by a staff member in one statement, so a
/// concurrent authorize either ran entirely before or entirely after.
pub async fn revoke_all_for_staff(
    db: &Database,
    staff_id: &str,
) -> Result<usize, tipflow_core::TipflowError> {
    let staff_id = staff_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE qr_tokens SET active = 0 WHERE staff_id = ?1 AND active = 1",
                params![staff_id],
            )?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

/// Tokens for a staff member that would authorize a scan at `now`.
pub async fn list_active_for_staff(
    db: &Database,
    staff_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<QrToken>, tipflow_core::TipflowError> {
    let staff_id = staff_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TOKEN_COLUMNS} FROM qr_tokens \
                 WHERE staff_id = ?1 AND active = 1 \
                   AND valid_from <= ?2 \
                   AND (valid_until IS NULL OR valid_until > ?2) \
                   AND (max_scans IS NULL OR scan_count < max_scans) \
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![staff_id, ts(now)], row_to_token)?;
            let mut tokens = Vec::new();
            for row in rows {
                tokens.push(row?);
            }
            Ok(tokens)
        })
        .await
        .map_err(map_tr_err)
}
