// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tipflow summary` subcommands.

use std::str::FromStr;

use chrono::Utc;
use tipflow_config::model::TipflowConfig;
use tipflow_core::{ScopeKind, SummaryScope, TipflowError};
use tipflow_engine::SummaryAggregator;
use tipflow_storage::Database;

use crate::SummaryCommands;

pub async fn run(config: TipflowConfig, command: SummaryCommands) -> Result<(), TipflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    let aggregator = SummaryAggregator::new(
        db.clone(),
        &config.summary,
        config.service.default_currency.clone(),
    );

    match command {
        SummaryCommands::Rebuild {
            kind,
            scope_id,
            date,
        } => {
            let kind = ScopeKind::from_str(&kind.to_uppercase()).map_err(|_| {
                TipflowError::Config(format!(
                    "scope kind must be business, location, or staff, got `{kind}`"
                ))
            })?;
            let date = date.parse().map_err(|_| {
                TipflowError::Config(format!("date must be YYYY-MM-DD, got `{date}`"))
            })?;

            let summary = aggregator
                .recalculate(&SummaryScope { kind, id: scope_id }, date, Utc::now())
                .await?;
            println!(
                "{} {} on {}: {} {} across {} tip(s)",
                summary.scope.kind,
                summary.scope.id,
                summary.date,
                summary.total_tips,
                summary.currency,
                summary.tip_count
            );
        }
    }

    db.close().await?;
    Ok(())
}
