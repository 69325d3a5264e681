// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summary Aggregator: rebuildable daily rollups over the ledger.
//!
//! Summaries are a cache, never a source of truth. `recalculate`
//! recomputes strictly from settled ledger rows and swaps the cached row
//! in one UPSERT; there is no incremental patching, so a rebuild racing
//! with a late settlement can miss it and the next rebuild picks it up.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tipflow_config::model::SummaryConfig;
use tipflow_core::{SummaryScope, TipSummary, TipflowError};
use tipflow_storage::{queries, Database};
use tracing::{debug, info};

/// Maintains and repairs the pre-aggregated rollup cache.
#[derive(Clone)]
pub struct SummaryAggregator {
    db: Database,
    staleness: Duration,
    default_currency: String,
}

impl SummaryAggregator {
    pub fn new(db: Database, config: &SummaryConfig, default_currency: String) -> Self {
        Self {
            db,
            staleness: Duration::seconds(config.staleness_secs),
            default_currency,
        }
    }

    /// Rebuild the summary for a scope and settlement date from the
    /// ledger, replacing whatever was cached.
    pub async fn recalculate(
        &self,
        scope: &SummaryScope,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<TipSummary, TipflowError> {
        let amounts =
            queries::tips::settled_amounts_for_scope_date(&self.db, scope, date).await?;

        let mut total = Decimal::ZERO;
        let mut currency = None;
        for (amount, row_currency) in &amounts {
            total += amount;
            currency.get_or_insert_with(|| row_currency.clone());
        }
        let tip_count = amounts.len() as u32;

        let summary = TipSummary {
            id: uuid::Uuid::new_v4().to_string(),
            scope: scope.clone(),
            date,
            total_tips: total,
            tip_count,
            currency: currency.unwrap_or_else(|| self.default_currency.clone()),
            computed_at: now,
        };
        queries::summaries::upsert(&self.db, &summary).await?;

        info!(
            scope_kind = %scope.kind,
            scope_id = %scope.id,
            %date,
            total_tips = %summary.total_tips,
            tip_count = summary.tip_count,
            "summary rebuilt"
        );

        // The UPSERT keeps the original row id on conflict; hand back the
        // stored row.
        queries::summaries::get(&self.db, scope, date)
            .await?
            .ok_or_else(|| {
                TipflowError::Internal("summary vanished between upsert and read".to_string())
            })
    }

    /// Cached summary if fresh per the staleness policy, else a rebuild.
    pub async fn get_or_rebuild(
        &self,
        scope: &SummaryScope,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<TipSummary, TipflowError> {
        if let Some(cached) = queries::summaries::get(&self.db, scope, date).await? {
            if now - cached.computed_at <= self.staleness {
                debug!(
                    scope_kind = %scope.kind,
                    scope_id = %scope.id,
                    %date,
                    "summary served from cache"
                );
                return Ok(cached);
            }
        }
        self.recalculate(scope, date, now).await
    }
}
