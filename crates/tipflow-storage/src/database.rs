// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and
//! lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: `Database` wraps one `tokio_rusqlite::Connection`, query
//! modules accept `&Database` and go through `connection().call()`. Do
//! NOT create additional Connection instances for writes.

use tipflow_core::TipflowError;
use tracing::debug;

/// Handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

/// Convert a tokio-rusqlite error into `TipflowError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TipflowError {
    TipflowError::Storage {
        source: Box::new(e),
    }
}

impl Database {
    /// Open (creating if necessary) the database at `path`, apply PRAGMAs,
    /// and run any pending migrations.
    pub async fn open(path: &str) -> Result<Self, TipflowError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TipflowError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| TipflowError::Storage {
                source: Box::new(e),
            })?;

        Self::initialize(&conn, true).await?;
        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database with the full schema applied. Test use.
    pub async fn open_in_memory() -> Result<Self, TipflowError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| TipflowError::Storage {
                source: Box::new(e),
            })?;
        Self::initialize(&conn, false).await?;
        Ok(Self { conn })
    }

    async fn initialize(
        conn: &tokio_rusqlite::Connection,
        wal: bool,
    ) -> Result<(), TipflowError> {
        conn.call(move |conn| {
            if wal {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(|e| TipflowError::Storage {
                source: Box::new(e),
            })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and flush. Call before shutdown.
    pub async fn close(&self) -> Result<(), TipflowError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
