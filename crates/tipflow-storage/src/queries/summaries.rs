// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summary cache operations.
//!
//! Summaries are replaced wholesale via UPSERT; there is no incremental
//! patching path, so readers either see the previous rebuild or the new
//! one, never a partial state.

use chrono::NaiveDate;
use rusqlite::params;
use tipflow_core::{SummaryScope, TipSummary};

use crate::codec::{parse_text, ts};
use crate::database::{map_tr_err, Database};

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<TipSummary> {
    Ok(TipSummary {
        id: row.get(0)?,
        scope: SummaryScope {
            kind: parse_text(1, row.get(1)?)?,
            id: row.get(2)?,
        },
        date: parse_text(3, row.get(3)?)?,
        total_tips: parse_text(4, row.get(4)?)?,
        tip_count: row.get(5)?,
        currency: row.get(6)?,
        computed_at: parse_text(7, row.get(7)?)?,
    })
}

/// Atomically replace the cached summary for the summary's key.
pub async fn upsert(
    db: &Database,
    summary: &TipSummary,
) -> Result<(), tipflow_core::TipflowError> {
    let summary = summary.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tip_summaries \
                 (id, scope_kind, scope_id, date, total_tips, tip_count, currency, computed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT (scope_kind, scope_id, date) DO UPDATE SET \
                     total_tips = excluded.total_tips, \
                     tip_count = excluded.tip_count, \
                     currency = excluded.currency, \
                     computed_at = excluded.computed_at",
                params![
                    summary.id,
                    summary.scope.kind.to_string(),
                    summary.scope.id,
                    summary.date.to_string(),
                    summary.total_tips.to_string(),
                    summary.tip_count,
                    summary.currency,
                    ts(summary.computed_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the cached summary for a scope and date, if one exists.
pub async fn get(
    db: &Database,
    scope: &SummaryScope,
    date: NaiveDate,
) -> Result<Option<TipSummary>, tipflow_core::TipflowError> {
    let kind = scope.kind.to_string();
    let scope_id = scope.id.clone();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, scope_kind, scope_id, date, total_tips, tip_count, currency, \
                 computed_at FROM tip_summaries \
                 WHERE scope_kind = ?1 AND scope_id = ?2 AND date = ?3",
            )?;
            match stmt.query_row(params![kind, scope_id, date], row_to_summary) {
                Ok(summary) => Ok(Some(summary)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn make_summary(total: &str, count: u32) -> TipSummary {
        TipSummary {
            id: uuid::Uuid::new_v4().to_string(),
            scope: SummaryScope::staff("staff-1"),
            date: "2026-03-01".parse().unwrap(),
            total_tips: total.parse().unwrap(),
            tip_count: count,
            currency: "GBP".to_string(),
            computed_at: Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let db = setup_db().await;
        let summary = make_summary("25.50", 3);
        upsert(&db, &summary).await.unwrap();

        let fetched = get(&db, &summary.scope, summary.date).await.unwrap().unwrap();
        assert_eq!(fetched, summary);
    }

    #[tokio::test]
    async fn second_upsert_replaces_the_first() {
        let db = setup_db().await;
        upsert(&db, &make_summary("25.50", 3)).await.unwrap();

        let rebuilt = make_summary("40.00", 5);
        upsert(&db, &rebuilt).await.unwrap();

        let fetched = get(&db, &rebuilt.scope, rebuilt.date).await.unwrap().unwrap();
        assert_eq!(fetched.total_tips, "40.00".parse().unwrap());
        assert_eq!(fetched.tip_count, 5);

        // Still exactly one row for the key.
        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM tip_summaries", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn scopes_do_not_collide() {
        let db = setup_db().await;
        let staff = make_summary("10.00", 1);
        let mut location = make_summary("99.00", 9);
        location.scope = SummaryScope::location("staff-1");
        upsert(&db, &staff).await.unwrap();
        upsert(&db, &location).await.unwrap();

        let fetched = get(&db, &staff.scope, staff.date).await.unwrap().unwrap();
        assert_eq!(fetched.total_tips, "10.00".parse().unwrap());
    }

    #[tokio::test]
    async fn missing_summary_is_none() {
        let db = setup_db().await;
        let result = get(&db, &SummaryScope::business("nope"), "2026-03-01".parse().unwrap())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
