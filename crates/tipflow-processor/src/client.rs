// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external payment processor.
//!
//! Speaks a Stripe-shaped API: form-encoded POSTs, bearer auth, amounts
//! in integer minor units, and an `Idempotency-Key` header that carries
//! the engine's key through unchanged.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::Deserialize;
use tipflow_config::model::ProcessorConfig;
use tipflow_core::TipflowError;
use tracing::debug;

use crate::{ChargeIntent, ChargeRequest, PaymentProcessor};

/// Production [`PaymentProcessor`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProcessor {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

/// Shape of the processor's payment-intent and refund responses; only the
/// fields the engine consumes.
#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl HttpProcessor {
    /// Build a client from configuration. Fails when no secret key is
    /// available.
    pub fn new(config: &ProcessorConfig) -> Result<Self, TipflowError> {
        let secret_key = config.secret_key.as_deref().ok_or_else(|| {
            TipflowError::Config(
                "processor.secret_key is required (or set TIPFLOW_PROCESSOR_SECRET_KEY)"
                    .to_string(),
            )
        })?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {secret_key}"))
            .map_err(|e| TipflowError::Config(format!("invalid secret key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("authorization", auth);

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| TipflowError::Processor {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Convert a validated major-unit amount to the processor's integer
    /// minor units (two decimal places).
    fn to_minor_units(amount: Decimal) -> Result<i64, TipflowError> {
        use rust_decimal::prelude::ToPrimitive;
        let minor = amount * Decimal::from(100);
        if minor.fract() != Decimal::ZERO {
            return Err(TipflowError::Internal(format!(
                "amount {amount} has more than two decimal places"
            )));
        }
        minor.to_i64().ok_or_else(|| {
            TipflowError::Internal(format!("amount {amount} out of range for minor units"))
        })
    }

    async fn read_error(response: reqwest::Response) -> TipflowError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(api_err) => format!("processor returned {status}: {}", api_err.error.message),
            Err(_) => format!("processor returned {status}: {body}"),
        };
        TipflowError::Processor {
            message,
            source: None,
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> TipflowError {
        if e.is_timeout() {
            TipflowError::Timeout {
                duration: self.timeout,
            }
        } else {
            TipflowError::Processor {
                message: format!("request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }
}

#[async_trait::async_trait]
impl PaymentProcessor for HttpProcessor {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeIntent, TipflowError> {
        let minor_units = Self::to_minor_units(request.amount)?;
        let mut form = vec![
            ("amount", minor_units.to_string()),
            ("currency", request.currency.to_lowercase()),
        ];
        if let Some(ref description) = request.description {
            form.push(("description", description.clone()));
        }

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .header("idempotency-key", &request.idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let intent: IntentResponse =
            response.json().await.map_err(|e| TipflowError::Processor {
                message: format!("malformed payment intent response: {e}"),
                source: Some(Box::new(e)),
            })?;

        debug!(
            payment_intent_id = %intent.id,
            status = %intent.status,
            "charge created"
        );
        Ok(ChargeIntent {
            payment_intent_id: intent.id,
            status: intent.status,
        })
    }

    async fn refund(&self, payment_intent_id: &str) -> Result<(), TipflowError> {
        let response = self
            .client
            .post(format!("{}/v1/refunds", self.base_url))
            .form(&[("payment_intent", payment_intent_id)])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        debug!(payment_intent_id, "refund requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> ProcessorConfig {
        ProcessorConfig {
            base_url: base_url.to_string(),
            secret_key: Some("sk_test_xyz".to_string()),
            webhook_secret: None,
            request_timeout_secs: 5,
            signature_tolerance_secs: 300,
        }
    }

    fn sample_request() -> ChargeRequest {
        ChargeRequest {
            amount: "10.00".parse().unwrap(),
            currency: "GBP".to_string(),
            idempotency_key: "key-abc".to_string(),
            description: Some("Tip for Alex".to_string()),
        }
    }

    #[test]
    fn minor_units_conversion() {
        let amount: Decimal = "10.00".parse().unwrap();
        assert_eq!(HttpProcessor::to_minor_units(amount).unwrap(), 1000);
        let amount: Decimal = "0.01".parse().unwrap();
        assert_eq!(HttpProcessor::to_minor_units(amount).unwrap(), 1);
    }

    #[test]
    fn sub_minor_precision_is_rejected() {
        let amount: Decimal = "1.005".parse().unwrap();
        assert!(HttpProcessor::to_minor_units(amount).is_err());
    }

    #[test]
    fn missing_secret_key_is_a_config_error() {
        let mut config = test_config("http://localhost");
        config.secret_key = None;
        let result = HttpProcessor::new(&config);
        assert!(matches!(result, Err(TipflowError::Config(_))));
    }

    #[tokio::test]
    async fn create_charge_sends_idempotency_key_and_minor_units() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("idempotency-key", "key-abc"))
            .and(header("authorization", "Bearer sk_test_xyz"))
            .and(body_string_contains("amount=1000"))
            .and(body_string_contains("currency=gbp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_123",
                "status": "requires_confirmation"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let processor = HttpProcessor::new(&test_config(&server.uri())).unwrap();
        let intent = processor.create_charge(&sample_request()).await.unwrap();
        assert_eq!(intent.payment_intent_id, "pi_123");
        assert_eq!(intent.status, "requires_confirmation");
    }

    #[tokio::test]
    async fn charge_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": { "message": "Your card was declined." }
            })))
            .mount(&server)
            .await;

        let processor = HttpProcessor::new(&test_config(&server.uri())).unwrap();
        let err = processor.create_charge(&sample_request()).await.unwrap_err();
        assert!(err.to_string().contains("card was declined"));
    }

    #[tokio::test]
    async fn refund_posts_the_payment_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .and(body_string_contains("payment_intent=pi_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "re_1",
                "status": "succeeded"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let processor = HttpProcessor::new(&test_config(&server.uri())).unwrap();
        processor.refund("pi_123").await.unwrap();
    }

    #[tokio::test]
    async fn refund_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "Charge has already been refunded." }
            })))
            .mount(&server)
            .await;

        let processor = HttpProcessor::new(&test_config(&server.uri())).unwrap();
        let err = processor.refund("pi_123").await.unwrap_err();
        assert!(err.to_string().contains("already been refunded"));
    }
}
