use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::config::PaymentConfig;
use crate::error::DemoAccessError;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Thin Stripe client. When no secret key is configured the payment
/// endpoints stay mounted but answer 500 with a clear message instead of
/// failing at startup.
pub struct PaymentClient {
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookObject,
}

#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    pub id: String,
}

impl PaymentClient {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            http: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Creates a payment intent for `amount_cents` and returns its id plus
    /// the client secret the frontend needs to confirm the payment.
    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        app_id: &str,
        customer_email: &str,
        customer_name: &str,
    ) -> Result<PaymentIntent, DemoAccessError> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(DemoAccessError::PaymentsNotConfigured)?;

        let params = [
            ("amount", amount_cents.to_string()),
            ("currency", "usd".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[app_id]", app_id.to_string()),
            ("metadata[customer_email]", customer_email.to_string()),
            ("metadata[customer_name]", customer_name.to_string()),
        ];

        let response = self
            .http
            .post(format!("{STRIPE_API_BASE}/payment_intents"))
            .bearer_auth(secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| DemoAccessError::Payment(format!("payment provider unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            tracing::error!("payment intent creation failed ({status}): {detail}");
            return Err(DemoAccessError::Payment(
                "payment intent creation failed".to_string(),
            ));
        }

        response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| DemoAccessError::Payment(format!("malformed payment response: {e}")))
    }

    /// Verifies a Stripe webhook signature header (`t=...,v1=...`) against
    /// the raw payload and parses the event. The signed message is
    /// `"{timestamp}.{payload}"` under HMAC-SHA256 with the webhook secret.
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, DemoAccessError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(DemoAccessError::PaymentsNotConfigured)?;

        let mut timestamp = None;
        let mut signature = None;
        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signature = Some(value),
                _ => {}
            }
        }
        let (timestamp, signature) = timestamp
            .zip(signature)
            .ok_or(DemoAccessError::InvalidSignature)?;

        let expected = decode_hex(signature).ok_or(DemoAccessError::InvalidSignature)?;

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|_| DemoAccessError::InvalidSignature)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| DemoAccessError::InvalidSignature)?;

        serde_json::from_slice(payload)
            .map_err(|e| DemoAccessError::Validation(format!("malformed webhook payload: {e}")))
    }
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(input.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_secret(webhook_secret: &str) -> PaymentClient {
        PaymentClient::new(&PaymentConfig {
            secret_key: Some("sk_test_123".to_string()),
            webhook_secret: Some(webhook_secret.to_string()),
        })
    }

    fn sign(secret: &str, timestamp: &str, payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    #[test]
    fn valid_signature_parses_the_event() {
        let client = client_with_secret("whsec_test");
        let payload =
            br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
        let header = format!("t=1714000000,v1={}", sign("whsec_test", "1714000000", payload));

        let event = client.verify_webhook(payload, &header).unwrap();
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.data.object.id, "pi_123");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let client = client_with_secret("whsec_test");
        let payload =
            br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
        let header = format!("t=1714000000,v1={}", sign("whsec_test", "1714000000", payload));

        let tampered =
            br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_999"}}}"#;
        let err = client.verify_webhook(tampered, &header).unwrap_err();
        assert!(matches!(err, DemoAccessError::InvalidSignature));
    }

    #[test]
    fn malformed_signature_headers_are_rejected() {
        let client = client_with_secret("whsec_test");
        for header in ["", "t=123", "v1=abcd", "t=123,v1=zz"] {
            let err = client.verify_webhook(b"{}", header).unwrap_err();
            assert!(matches!(err, DemoAccessError::InvalidSignature), "{header}");
        }
    }

    #[test]
    fn unconfigured_client_refuses_webhooks() {
        let client = PaymentClient::new(&PaymentConfig {
            secret_key: None,
            webhook_secret: None,
        });
        assert!(!client.is_configured());
        let err = client.verify_webhook(b"{}", "t=1,v1=00").unwrap_err();
        assert!(matches!(err, DemoAccessError::PaymentsNotConfigured));
    }
}
