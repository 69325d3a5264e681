// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router assembly and the HTTP server loop.

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tipflow_core::TipflowError;
use tipflow_engine::{Ledger, Reconciler, SummaryAggregator, TokenAuthority};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Shared state for the request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub tokens: TokenAuthority,
    pub ledger: Ledger,
    pub reconciler: Reconciler,
    pub summaries: SummaryAggregator,
    pub auth: AuthConfig,
    /// Shared secret verifying inbound webhook signatures. `None`
    /// rejects every delivery (fail-closed).
    pub webhook_secret: Option<String>,
    /// Signature timestamp tolerance in seconds.
    pub signature_tolerance_secs: i64,
    /// Currency assumed when a tip request does not name one.
    pub default_currency: String,
}

/// Server bind configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Assemble the full route tree over the given state.
pub fn build_router(state: GatewayState) -> Router {
    // Customer-facing routes plus the signed webhook endpoint.
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/v1/scan", post(handlers::post_scan))
        .route("/v1/tips", post(handlers::post_tips))
        .route("/v1/webhooks/processor", post(handlers::post_webhook))
        .with_state(state.clone());

    // Operator routes behind bearer auth.
    let operator_routes = Router::new()
        .route("/v1/tips/{id}", get(handlers::get_tip))
        .route("/v1/tips/{id}/refund", post(handlers::post_refund))
        .route(
            "/v1/summaries/{kind}/{scope_id}/{date}",
            get(handlers::get_summary),
        )
        .route("/v1/webhooks/unprocessed", get(handlers::get_unprocessed))
        .route("/v1/webhooks/replay", post(handlers::post_replay))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(operator_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the task is cancelled.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), TipflowError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TipflowError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| TipflowError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug_prints_address() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8470,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(debug.contains("8470"));
    }
}
