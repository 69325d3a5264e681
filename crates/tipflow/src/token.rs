// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tipflow token` subcommands.

use std::str::FromStr;

use chrono::{Duration, Utc};
use tipflow_config::model::TipflowConfig;
use tipflow_core::{TipflowError, TokenKind};
use tipflow_engine::{IssueTokenRequest, TokenAuthority};
use tipflow_storage::Database;

use crate::TokenCommands;

pub async fn run(config: TipflowConfig, command: TokenCommands) -> Result<(), TipflowError> {
    let db = Database::open(&config.storage.database_path).await?;
    let authority = TokenAuthority::new(db.clone());
    let now = Utc::now();

    match command {
        TokenCommands::Issue {
            staff,
            business,
            location,
            kind,
            shift_id,
            valid_hours,
            max_scans,
        } => {
            let kind = TokenKind::from_str(&kind.to_uppercase()).map_err(|_| {
                TipflowError::Config(format!(
                    "token kind must be SHIFT, DAILY, or PERSISTENT, got `{kind}`"
                ))
            })?;
            let token = authority
                .issue(
                    IssueTokenRequest {
                        staff_id: staff,
                        business_id: business,
                        location_id: location,
                        kind,
                        shift_id,
                        valid_from: now,
                        valid_until: valid_hours.map(|h| now + Duration::hours(h)),
                        max_scans,
                    },
                    now,
                )
                .await?;
            println!("token issued: {}", token.token);
            println!("  id:          {}", token.id);
            println!("  staff:       {}", token.staff_id);
            println!("  kind:        {}", token.kind);
            match token.valid_until {
                Some(until) => println!("  valid until: {until}"),
                None => println!("  valid until: (no expiry)"),
            }
        }
        TokenCommands::Revoke { token_id } => {
            authority.revoke(&token_id).await?;
            println!("token {token_id} revoked");
        }
        TokenCommands::RevokeStaff { staff_id } => {
            let revoked = authority.revoke_all_for_staff(&staff_id).await?;
            println!("revoked {revoked} token(s) for staff {staff_id}");
        }
    }

    db.close().await?;
    Ok(())
}
