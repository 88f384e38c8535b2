use crate::circuit_breaker::{create_gateway_circuit_breaker, GatewayCircuitBreaker};
use crate::errors::AppError;
use crate::payment::{
    PaymentError, PushAcknowledgement, PushGateway, PushRequest, REJECTED_FALLBACK_MESSAGE,
};
use crate::validation::mask_phone;
use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_ACK_MESSAGE: &str =
    "Payment request sent. Check your phone and enter your M-Pesa PIN to complete payment.";

/// Client for the external STK push payment-initiation endpoint.
pub struct StkPushClient {
    client: reqwest::Client,
    endpoint: String,
    breaker: GatewayCircuitBreaker,
}

impl StkPushClient {
    /// Creates a new `StkPushClient`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL requests are POSTed to.
    /// * `timeout` - Upper bound for one request, connect included.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create payment client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            breaker: create_gateway_circuit_breaker(),
        })
    }

    /// Sends one push request.
    ///
    /// - transport failure, timeout or unreadable 2xx body: `Transport`
    /// - non-2xx, or 2xx carrying an `error` field: `Rejected`
    /// - otherwise: acknowledged
    async fn send(&self, request: &PushRequest) -> Result<PushAcknowledgement, PaymentError> {
        tracing::info!(
            "Sending push request {} for Ksh {} to {}",
            request.reference,
            request.amount,
            mask_phone(&request.phone)
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(format!("Push request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            PaymentError::Transport(format!("Failed to read push response: {}", e))
        })?;

        let parsed: Option<Value> = if body.trim().is_empty() {
            None
        } else {
            match serde_json::from_str(&body) {
                Ok(value) => Some(value),
                Err(e) if status.is_success() => {
                    return Err(PaymentError::Transport(format!(
                        "Failed to parse push response: {}",
                        e
                    )));
                }
                Err(_) => None,
            }
        };

        if !status.is_success() {
            let reason = parsed
                .as_ref()
                .and_then(gateway_reason)
                .unwrap_or_else(|| REJECTED_FALLBACK_MESSAGE.to_string());
            tracing::warn!(
                "Push request {} rejected with {}: {}",
                request.reference,
                status,
                reason
            );
            return Err(PaymentError::Rejected(reason));
        }

        if let Some(value) = parsed.as_ref().filter(|v| has_error_field(v)) {
            let reason =
                gateway_reason(value).unwrap_or_else(|| REJECTED_FALLBACK_MESSAGE.to_string());
            tracing::warn!("Push request {} rejected: {}", request.reference, reason);
            return Err(PaymentError::Rejected(reason));
        }

        let message = parsed
            .as_ref()
            .and_then(|v| first_str(v, &["message", "CustomerMessage"]))
            .unwrap_or_else(|| DEFAULT_ACK_MESSAGE.to_string());
        let checkout_request_id = parsed
            .as_ref()
            .and_then(|v| first_str(v, &["checkout_request_id", "CheckoutRequestID"]));

        tracing::info!("✓ Push request {} acknowledged", request.reference);
        Ok(PushAcknowledgement {
            message,
            checkout_request_id,
        })
    }
}

#[async_trait]
impl PushGateway for StkPushClient {
    async fn initiate(&self, request: &PushRequest) -> Result<PushAcknowledgement, PaymentError> {
        let result = self
            .breaker
            .call_with(|e: &PaymentError| e.is_transport(), self.send(request))
            .await;

        match result {
            Ok(ack) => Ok(ack),
            Err(failsafe::Error::Inner(e)) => {
                if e.is_transport() {
                    tracing::error!("Push request {} failed: {}", request.reference, e);
                }
                Err(e)
            }
            Err(failsafe::Error::Rejected) => {
                tracing::error!(
                    "Payment gateway circuit open, push request {} not sent",
                    request.reference
                );
                Err(PaymentError::Transport("circuit open".to_string()))
            }
        }
    }
}

/// A present, non-empty `error` field marks an application-level failure.
fn has_error_field(value: &Value) -> bool {
    match value.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Human-readable reason from a gateway error body, if it carries one.
fn gateway_reason(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .or_else(|| first_str(value, &["message", "errorMessage"]))
}

fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_client_creation() {
        let client = StkPushClient::new(
            "https://example.com/stk".to_string(),
            Duration::from_secs(20),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_error_field_detection() {
        assert!(has_error_field(&json!({"error": "Invalid amount"})));
        assert!(has_error_field(&json!({"error": {"code": 1}})));
        assert!(!has_error_field(&json!({"error": null})));
        assert!(!has_error_field(&json!({"error": false})));
        assert!(!has_error_field(&json!({"error": ""})));
        assert!(!has_error_field(&json!({"message": "ok"})));
    }

    #[test]
    fn test_gateway_reason() {
        assert_eq!(
            gateway_reason(&json!({"error": "Invalid phone"})),
            Some("Invalid phone".to_string())
        );
        assert_eq!(
            gateway_reason(&json!({"error": {"message": "Amount too low"}})),
            Some("Amount too low".to_string())
        );
        assert_eq!(
            gateway_reason(&json!({"error": true, "message": "Declined"})),
            Some("Declined".to_string())
        );
        assert_eq!(gateway_reason(&json!({"error": true})), None);
    }
}
