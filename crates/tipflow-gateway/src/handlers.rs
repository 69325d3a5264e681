// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers for the gateway.
//!
//! The webhook handler is the delicate one: it verifies the provider's
//! signature over the raw body before anything else, answers 200 for
//! replays and benign no-ops (the provider's retry logic must see them
//! as success), 422 for terminal events (orphan, malformed) so the
//! provider stops redelivering, and 503 for transient storage failures
//! so it does not.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use tipflow_core::{
    AuthError, AuthorizeError, CreateTipError, ReconcileError, RefundError, ScopeKind,
    SummaryScope, Tip, TipSummary,
};
use tipflow_engine::{CreateTipRequest, ReconcileOutcome};
use tipflow_processor::signature::{verify_signature, SignatureError};

use crate::server::GatewayState;

/// Signature header set by the payment processor on webhook deliveries.
const SIGNATURE_HEADER: &str = "stripe-signature";

// --- Request/response bodies ---

/// Request body for POST /v1/scan.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// The opaque string read out of the QR image.
    pub token: String,
}

/// Response body for POST /v1/scan.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub token_id: String,
    pub staff_id: String,
    pub business_id: String,
    pub location_id: Option<String>,
    pub scan_count: u32,
}

/// Request body for POST /v1/tips.
#[derive(Debug, Deserialize)]
pub struct TipRequest {
    pub token: String,
    /// Fixed-point amount, e.g. "10.00".
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    pub idempotency_key: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub tip_message: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Tip representation returned by the API.
#[derive(Debug, Serialize)]
pub struct TipResponse {
    pub id: String,
    pub staff_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub payment_intent_id: String,
    pub created_at: DateTime<Utc>,
    pub succeeded_at: Option<DateTime<Utc>>,
}

impl From<Tip> for TipResponse {
    fn from(tip: Tip) -> Self {
        Self {
            id: tip.id,
            staff_id: tip.staff_id,
            amount: tip.amount,
            currency: tip.currency,
            status: tip.status.to_string(),
            created_at: tip.created_at,
            succeeded_at: tip.succeeded_at,
            payment_intent_id: tip.payment_intent_id,
        }
    }
}

/// Acknowledgement body for webhook deliveries.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Summary representation returned by the API.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub scope_kind: String,
    pub scope_id: String,
    pub date: NaiveDate,
    pub total_tips: Decimal,
    pub tip_count: u32,
    pub currency: String,
    pub computed_at: DateTime<Utc>,
}

impl From<TipSummary> for SummaryResponse {
    fn from(summary: TipSummary) -> Self {
        Self {
            scope_kind: summary.scope.kind.to_string(),
            scope_id: summary.scope.id,
            date: summary.date,
            total_tips: summary.total_tips,
            tip_count: summary.tip_count,
            currency: summary.currency,
            computed_at: summary.computed_at,
        }
    }
}

/// Response body for GET /v1/health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// --- Public handlers ---

/// GET /health
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /v1/scan
///
/// Consumes one scan of the presented token and returns the staff
/// identity it authorizes tipping for.
pub async fn post_scan(
    State(state): State<GatewayState>,
    Json(body): Json<ScanRequest>,
) -> Response {
    match state.tokens.authorize(&body.token, Utc::now()).await {
        Ok(handle) => (
            StatusCode::OK,
            Json(ScanResponse {
                token_id: handle.token_id,
                staff_id: handle.staff_id,
                business_id: handle.business_id,
                location_id: handle.location_id,
                scan_count: handle.scan_count,
            }),
        )
            .into_response(),
        Err(e) => authorize_error_response(e),
    }
}

fn authorize_error_response(error: AuthorizeError) -> Response {
    match error {
        AuthorizeError::Rejected(reason) => {
            let status = match reason {
                AuthError::NotFound => StatusCode::NOT_FOUND,
                AuthError::NotYetValid => StatusCode::FORBIDDEN,
                AuthError::Inactive | AuthError::Expired | AuthError::ScanLimitReached => {
                    StatusCode::GONE
                }
            };
            error_response(status, reason.to_string())
        }
        AuthorizeError::Infra(e) => {
            warn!(error = %e, "authorization failed on infrastructure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// POST /v1/tips
///
/// Authorizes the token and creates a PENDING tip. Retried requests with
/// the same idempotency key return the original record with 200.
pub async fn post_tips(State(state): State<GatewayState>, Json(body): Json<TipRequest>) -> Response {
    let now = Utc::now();
    let authorized = match state.tokens.authorize(&body.token, now).await {
        Ok(handle) => handle,
        Err(e) => return authorize_error_response(e),
    };

    let request = CreateTipRequest {
        authorized,
        amount: body.amount,
        currency: body
            .currency
            .unwrap_or_else(|| state.default_currency.clone()),
        idempotency_key: body.idempotency_key,
        customer_name: body.customer_name,
        customer_email: body.customer_email,
        tip_message: body.tip_message,
        metadata: body.metadata,
    };

    match state.ledger.create_pending(request, now).await {
        Ok(tip) => (StatusCode::OK, Json(TipResponse::from(tip))).into_response(),
        Err(CreateTipError::InvalidAmount(detail)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, detail)
        }
        Err(CreateTipError::InvalidCurrency(currency)) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid currency code: {currency}"),
        ),
        Err(CreateTipError::ChargeFailed(e)) => {
            warn!(error = %e, "charge request failed");
            error_response(StatusCode::BAD_GATEWAY, "charge request failed")
        }
        Err(CreateTipError::Infra(e)) => {
            warn!(error = %e, "tip creation failed on infrastructure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// POST /v1/webhooks/processor
///
/// Verifies the provider signature over the raw body, then hands the
/// event to the reconciler.
pub async fn post_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let now = Utc::now();

    let Some(ref secret) = state.webhook_secret else {
        tracing::error!("webhook secret not configured -- rejecting delivery");
        return error_response(StatusCode::UNAUTHORIZED, "webhook verification unavailable");
    };
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing signature header");
    };
    if let Err(e) = verify_signature(&body, signature, secret, now, state.signature_tolerance_secs)
    {
        let status = match e {
            SignatureError::Malformed => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        };
        return error_response(status, e.to_string());
    }

    let payload = match std::str::from_utf8(&body) {
        Ok(payload) => payload,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "body is not UTF-8"),
    };
    let envelope: serde_json::Value = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("payload is not JSON: {e}"),
            )
        }
    };
    let (Some(event_id), Some(event_type)) = (
        envelope.get("id").and_then(|v| v.as_str()),
        envelope.get("type").and_then(|v| v.as_str()),
    ) else {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "payload is missing id or type",
        );
    };

    match state
        .reconciler
        .receive(event_id, event_type, payload, now)
        .await
    {
        // Replays and benign no-ops must be indistinguishable from
        // success to the provider's retry logic.
        Ok(
            ReconcileOutcome::Applied
            | ReconcileOutcome::BenignNoOp
            | ReconcileOutcome::Replay
            | ReconcileOutcome::Ignored,
        ) => (StatusCode::OK, Json(WebhookAck { received: true })).into_response(),
        Err(e @ (ReconcileError::OrphanEvent { .. } | ReconcileError::MalformedPayload { .. })) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(ReconcileError::Infra(e)) => {
            warn!(error = %e, "webhook processing failed transiently");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "retry later")
        }
    }
}

// --- Operator handlers ---

/// GET /v1/tips/{id}
pub async fn get_tip(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.ledger.get(&id).await {
        Ok(Some(tip)) => (StatusCode::OK, Json(TipResponse::from(tip))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "tip not found"),
        Err(e) => {
            warn!(error = %e, "tip lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// POST /v1/tips/{id}/refund
pub async fn post_refund(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.ledger.initiate_refund(&id, Utc::now()).await {
        Ok(tip) => (StatusCode::OK, Json(TipResponse::from(tip))).into_response(),
        Err(RefundError::NotFound) => error_response(StatusCode::NOT_FOUND, "tip not found"),
        Err(RefundError::NotRefundable { reason }) => {
            error_response(StatusCode::CONFLICT, reason)
        }
        Err(RefundError::RefundCallFailed(e)) => {
            warn!(error = %e, "refund call failed");
            error_response(StatusCode::BAD_GATEWAY, "refund call failed")
        }
        Err(RefundError::Infra(e)) => {
            warn!(error = %e, "refund failed on infrastructure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// GET /v1/summaries/{kind}/{scope_id}/{date}
pub async fn get_summary(
    State(state): State<GatewayState>,
    Path((kind, scope_id, date)): Path<(String, String, String)>,
) -> Response {
    let Ok(kind) = ScopeKind::from_str(&kind.to_uppercase()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "scope kind must be business, location, or staff",
        );
    };
    let Ok(date) = date.parse::<NaiveDate>() else {
        return error_response(StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD");
    };

    let scope = SummaryScope {
        kind,
        id: scope_id,
    };
    match state.summaries.get_or_rebuild(&scope, date, Utc::now()).await {
        Ok(summary) => (StatusCode::OK, Json(SummaryResponse::from(summary))).into_response(),
        Err(e) => {
            warn!(error = %e, "summary rebuild failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// GET /v1/webhooks/unprocessed
pub async fn get_unprocessed(State(state): State<GatewayState>) -> Response {
    match state.reconciler.unprocessed_events().await {
        Ok(events) => {
            let ids: Vec<_> = events
                .into_iter()
                .map(|e| {
                    serde_json::json!({
                        "event_id": e.event_id,
                        "event_type": e.event_type,
                        "created_at": e.created_at,
                    })
                })
                .collect();
            (StatusCode::OK, Json(serde_json::json!({ "events": ids }))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "unprocessed listing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// POST /v1/webhooks/replay
pub async fn post_replay(State(state): State<GatewayState>) -> Response {
    match state.reconciler.replay_unprocessed(Utc::now()).await {
        Ok(sweep) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "resolved": sweep.resolved,
                "still_failing": sweep.still_failing,
            })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "replay sweep failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}
