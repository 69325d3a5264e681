// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook Reconciler: at-most-once application of processor events.
//!
//! The order of operations is the whole point. The event row goes in
//! first (insert-or-detect on the unique event id), the ledger mutation
//! second, the processed flag last. A redelivery of an already-processed
//! event short-circuits without reprocessing; a redelivery of a stored
//! but unprocessed event (crash between mutation and flag, or an earlier
//! orphan) is re-driven, where the transition guard turns any duplicate
//! mutation into a benign no-op. Under no interleaving does one event id
//! mutate the ledger twice.

use chrono::{DateTime, Utc};
use tipflow_core::{ReconcileError, TipflowError, TransitionError, WebhookEvent};
use tipflow_storage::{queries, Database};
use tracing::{debug, info, warn};

use crate::ledger::Ledger;

/// Event types that drive ledger transitions.
const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// What a delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The ledger transition was applied.
    Applied,
    /// The targeted transition was illegal (duplicate outcome through a
    /// second delivery path); recorded and swallowed.
    BenignNoOp,
    /// The event id was already fully processed; nothing was redone.
    Replay,
    /// Unrecognized event type; recorded, no ledger mutation.
    Ignored,
}

/// Result of an operator replay sweep over unprocessed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySweep {
    /// Events that completed processing this pass.
    pub resolved: usize,
    /// Events still terminal-failing (orphan, malformed).
    pub still_failing: usize,
}

/// Consumes inbound processor events and drives the ledger.
#[derive(Clone)]
pub struct Reconciler {
    db: Database,
    ledger: Ledger,
}

impl Reconciler {
    pub fn new(db: Database, ledger: Ledger) -> Self {
        Self { db, ledger }
    }

    /// Apply one delivery of a processor event.
    ///
    /// Transient failures (`ReconcileError::Infra`) leave the event
    /// unprocessed so the transport retries; orphan and malformed events
    /// are terminal for the delivery and stay unprocessed for operator
    /// replay.
    pub async fn receive(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let event = WebhookEvent {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            payload: payload.to_string(),
            processed: false,
            processed_at: None,
            created_at: now,
        };

        let newly_inserted = queries::webhook_events::insert_if_new(&self.db, &event)
            .await
            .map_err(ReconcileError::Infra)?;
        if newly_inserted {
            return self.process(&event, now).await;
        }

        // The id was seen before. Only a fully processed event may be
        // skipped; an unprocessed one is re-driven from its stored form
        // (crash window or prior orphan).
        let stored = queries::webhook_events::get_by_event_id(&self.db, event_id)
            .await
            .map_err(ReconcileError::Infra)?
            .ok_or_else(|| {
                ReconcileError::Infra(TipflowError::Internal(format!(
                    "event {event_id} vanished between insert and read"
                )))
            })?;
        if stored.processed {
            debug!(event_id, "duplicate webhook delivery, replay acknowledged");
            return Ok(ReconcileOutcome::Replay);
        }
        debug!(event_id, "redelivery of unprocessed event, reprocessing");
        self.process(&stored, now).await
    }

    /// Dispatch a stored event and, on completion, flip its processed
    /// flag. The flag write is the final step, after the ledger mutation
    /// is durably committed.
    async fn process(
        &self,
        event: &WebhookEvent,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let outcome = match event.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED | EVENT_PAYMENT_FAILED => {
                self.apply_payment_event(event, now).await?
            }
            other => {
                debug!(
                    event_id = %event.event_id,
                    event_type = other,
                    "unrecognized event type recorded"
                );
                ReconcileOutcome::Ignored
            }
        };

        queries::webhook_events::mark_processed(&self.db, &event.event_id, now)
            .await
            .map_err(ReconcileError::Infra)?;
        Ok(outcome)
    }

    async fn apply_payment_event(
        &self,
        event: &WebhookEvent,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let payment_intent_id = extract_payment_intent(&event.payload)?;

        let Some(tip) = self
            .ledger
            .get_by_payment_intent(&payment_intent_id)
            .await
            .map_err(ReconcileError::Infra)?
        else {
            warn!(
                event_id = %event.event_id,
                payment_intent_id = %payment_intent_id,
                "orphan webhook event, left unprocessed for operator replay"
            );
            return Err(ReconcileError::OrphanEvent { payment_intent_id });
        };

        let result = if event.event_type == EVENT_PAYMENT_SUCCEEDED {
            self.ledger.mark_succeeded(&tip.id, now).await
        } else {
            self.ledger.mark_failed(&tip.id, now).await
        };

        match result {
            Ok(tip) => {
                info!(
                    event_id = %event.event_id,
                    tip_id = %tip.id,
                    status = %tip.status,
                    "webhook event applied"
                );
                Ok(ReconcileOutcome::Applied)
            }
            Err(TransitionError::InvalidTransition { from, to }) => {
                // Providers redeliver; a duplicate outcome is not an error.
                debug!(
                    event_id = %event.event_id,
                    tip_id = %tip.id,
                    %from,
                    %to,
                    "event targets an already-handled tip, benign no-op"
                );
                Ok(ReconcileOutcome::BenignNoOp)
            }
            Err(TransitionError::NotFound) => Err(ReconcileError::OrphanEvent {
                payment_intent_id,
            }),
            Err(TransitionError::Infra(e)) => Err(ReconcileError::Infra(e)),
        }
    }

    /// Events awaiting operator attention, oldest first.
    pub async fn unprocessed_events(&self) -> Result<Vec<WebhookEvent>, TipflowError> {
        queries::webhook_events::list_unprocessed(&self.db).await
    }

    /// Re-drive every unprocessed event once. Operator remediation after
    /// an orphan's missing tip has been recreated.
    pub async fn replay_unprocessed(&self, now: DateTime<Utc>) -> Result<ReplaySweep, TipflowError> {
        let mut sweep = ReplaySweep::default();
        for event in self.unprocessed_events().await? {
            match self.process(&event, now).await {
                Ok(_) => sweep.resolved += 1,
                Err(ReconcileError::Infra(e)) => return Err(e),
                Err(_) => sweep.still_failing += 1,
            }
        }
        info!(
            resolved = sweep.resolved,
            still_failing = sweep.still_failing,
            "replay sweep complete"
        );
        Ok(sweep)
    }
}

/// Pull `data.object.id` out of a processor event payload.
fn extract_payment_intent(payload: &str) -> Result<String, ReconcileError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| ReconcileError::MalformedPayload {
            detail: format!("payload is not JSON: {e}"),
        })?;
    value
        .pointer("/data/object/id")
        .and_then(|id| id.as_str())
        .map(str::to_string)
        .ok_or_else(|| ReconcileError::MalformedPayload {
            detail: "missing data.object.id".to_string(),
        })
}
