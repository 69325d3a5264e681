// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tipflow status` command: table counts and events needing attention.

use tipflow_config::model::TipflowConfig;
use tipflow_core::TipflowError;
use tipflow_storage::{queries, Database};

pub async fn run(config: TipflowConfig) -> Result<(), TipflowError> {
    let db = Database::open(&config.storage.database_path).await?;

    let (tokens, active_tokens, tips, settled, events, summaries) = db
        .connection()
        .call(|conn| -> Result<(i64, i64, i64, i64, i64, i64), rusqlite::Error> {
            let count = |conn: &rusqlite::Connection, sql: &str| -> Result<i64, rusqlite::Error> {
                conn.query_row(sql, [], |row| row.get(0))
            };
            Ok((
                count(conn, "SELECT COUNT(*) FROM qr_tokens")?,
                count(conn, "SELECT COUNT(*) FROM qr_tokens WHERE active = 1")?,
                count(conn, "SELECT COUNT(*) FROM tips")?,
                count(conn, "SELECT COUNT(*) FROM tips WHERE status = 'SUCCEEDED'")?,
                count(conn, "SELECT COUNT(*) FROM webhook_events")?,
                count(conn, "SELECT COUNT(*) FROM tip_summaries")?,
            ))
        })
        .await
        .map_err(tipflow_storage::database::map_tr_err)?;

    println!("database: {}", config.storage.database_path);
    println!("  qr tokens:      {tokens} ({active_tokens} active)");
    println!("  tips:           {tips} ({settled} settled)");
    println!("  webhook events: {events}");
    println!("  summaries:      {summaries}");

    let unprocessed = queries::webhook_events::list_unprocessed(&db).await?;
    if unprocessed.is_empty() {
        println!("  no unprocessed webhook events");
    } else {
        println!("  unprocessed webhook events ({}):", unprocessed.len());
        for event in unprocessed {
            println!("    {} {} ({})", event.created_at, event.event_id, event.event_type);
        }
    }

    db.close().await?;
    Ok(())
}
