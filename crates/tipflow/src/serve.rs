// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tipflow serve` command implementation.
//!
//! Wires storage, the payment processor client, and the four engine
//! services into the HTTP gateway, then runs until a shutdown signal.

use std::sync::Arc;

use tipflow_config::model::TipflowConfig;
use tipflow_core::TipflowError;
use tipflow_engine::{Ledger, Reconciler, SummaryAggregator, TokenAuthority};
use tipflow_gateway::{AuthConfig, GatewayState, ServerConfig};
use tipflow_processor::HttpProcessor;
use tipflow_storage::Database;
use tracing::{error, info, warn};

/// Runs the `tipflow serve` command.
pub async fn run_serve(config: TipflowConfig) -> Result<(), TipflowError> {
    init_tracing(&config.service.log_level);

    info!("starting tipflow serve");

    if config.processor.webhook_secret.is_none() {
        warn!("processor.webhook_secret is not set; all webhook deliveries will be rejected");
    }
    if config.server.bearer_token.is_none() {
        warn!("server.bearer_token is not set; all operator requests will be rejected");
    }

    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path, "storage ready");

    let processor = Arc::new(HttpProcessor::new(&config.processor)?);

    let tokens = TokenAuthority::new(db.clone());
    let ledger = Ledger::new(db.clone(), processor, &config.refund);
    let reconciler = Reconciler::new(db.clone(), ledger.clone());
    let summaries = SummaryAggregator::new(
        db.clone(),
        &config.summary,
        config.service.default_currency.clone(),
    );

    let state = GatewayState {
        tokens,
        ledger,
        reconciler,
        summaries,
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
        },
        webhook_secret: config.processor.webhook_secret.clone(),
        signature_tolerance_secs: config.processor.signature_tolerance_secs,
        default_currency: config.service.default_currency.clone(),
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    let server = tokio::spawn(async move {
        if let Err(e) = tipflow_gateway::start_server(&server_config, state).await {
            error!(error = %e, "gateway server error");
        }
    });

    tokio::signal::ctrl_c().await.map_err(|e| {
        TipflowError::Internal(format!("failed to install signal handler: {e}"))
    })?;
    info!("shutdown signal received");

    server.abort();
    db.close().await?;
    info!("tipflow serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tipflow={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
