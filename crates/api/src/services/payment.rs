//! Payment gateway adapter.
//!
//! When `PAYMENT_GATEWAY_URL` is configured, card payments are forwarded to
//! the external gateway over HTTPS and settled asynchronously by its webhook.
//! Without a gateway the adapter runs in simulation mode: references are
//! generated locally and card charges succeed with a small random failure
//! rate, which keeps local development honest about declined-payment paths.

use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use clementine_core::{PaymentMethod, PaymentStatus};

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

/// Errors from payment processing.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The charge was refused.
    #[error("payment declined: {0}")]
    Declined(String),

    /// Webhook signature did not verify.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// The gateway answered with an error.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// The gateway could not be reached.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A created payment intent, handed to the client to complete the charge.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub reference: String,
    pub amount: rust_decimal::Decimal,
    pub currency: &'static str,
}

/// A webhook event from the gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub reference: String,
    pub order_number: String,
    /// `paid` or `failed`.
    pub status: String,
}

#[derive(Deserialize)]
struct GatewayChargeResponse {
    reference: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Adapter over the configured gateway, or the simulator without one.
pub struct PaymentProcessor {
    config: PaymentConfig,
    http: reqwest::Client,
}

impl PaymentProcessor {
    #[must_use]
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Create a payment intent for an order total.
    ///
    /// Methods that never touch the gateway (cash on delivery, bank
    /// transfer) get a local reference and stay `pending` until fulfilment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http`/`PaymentError::Gateway` when the gateway
    /// call fails.
    pub async fn create_intent(
        &self,
        order_number: &str,
        amount: rust_decimal::Decimal,
        method: PaymentMethod,
    ) -> Result<PaymentIntent, PaymentError> {
        if !method.uses_gateway() {
            return Ok(PaymentIntent {
                reference: format!("local_{}", Uuid::new_v4().simple()),
                amount,
                currency: "USD",
            });
        }

        let Some((url, key)) = self.gateway() else {
            return Ok(PaymentIntent {
                reference: format!("sim_{}", Uuid::new_v4().simple()),
                amount,
                currency: "USD",
            });
        };

        let response = self
            .http
            .post(format!("{url}/v1/intents"))
            .bearer_auth(key.expose_secret())
            .json(&serde_json::json!({
                "order_number": order_number,
                "amount": amount,
                "currency": "USD",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Gateway(format!(
                "intent creation returned {}",
                response.status()
            )));
        }

        let body: GatewayChargeResponse = response.json().await?;
        Ok(PaymentIntent {
            reference: body.reference,
            amount,
            currency: "USD",
        })
    }

    /// Confirm a charge and report its settled status.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Declined` when the charge is refused.
    pub async fn confirm(
        &self,
        reference: &str,
        method: PaymentMethod,
    ) -> Result<PaymentStatus, PaymentError> {
        if !method.uses_gateway() {
            return Ok(PaymentStatus::Pending);
        }

        let Some((url, key)) = self.gateway() else {
            // Simulation: roughly one card in twenty is declined.
            if rand::thread_rng().gen_ratio(1, 20) {
                return Err(PaymentError::Declined(
                    "Your card was declined. Please try another payment method.".to_string(),
                ));
            }
            return Ok(PaymentStatus::Paid);
        };

        let response = self
            .http
            .post(format!("{url}/v1/charges/{reference}/confirm"))
            .bearer_auth(key.expose_secret())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Gateway(format!(
                "charge confirmation returned {}",
                response.status()
            )));
        }

        let body: GatewayChargeResponse = response.json().await?;
        match body.status.as_str() {
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Err(PaymentError::Declined(
                body.message
                    .unwrap_or_else(|| "Payment was declined".to_string()),
            )),
            _ => Ok(PaymentStatus::Pending),
        }
    }

    /// Verify the `X-Webhook-Signature` header against the raw body.
    ///
    /// The signature is lowercase hex of HMAC-SHA256 over the body with the
    /// shared webhook secret.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on any mismatch.
    pub fn verify_webhook_signature(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<(), PaymentError> {
        let expected = hex::decode(signature).map_err(|_| PaymentError::InvalidSignature)?;

        let mut mac =
            HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
                .map_err(|_| PaymentError::InvalidSignature)?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::InvalidSignature)
    }

    /// Sign a payload the way the gateway does. Test and tooling helper.
    #[must_use]
    pub fn sign_webhook_payload(secret: &SecretString, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn gateway(&self) -> Option<(&str, &SecretString)> {
        match (&self.config.gateway_url, &self.config.secret_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn processor() -> PaymentProcessor {
        PaymentProcessor::new(PaymentConfig {
            gateway_url: None,
            secret_key: None,
            webhook_secret: SecretString::from("whsec_testing_9f2k"),
        })
    }

    #[test]
    fn test_webhook_signature_roundtrip() {
        let p = processor();
        let body = br#"{"reference":"sim_1","order_number":"ORD-1","status":"paid"}"#;
        let sig =
            PaymentProcessor::sign_webhook_payload(&SecretString::from("whsec_testing_9f2k"), body);
        assert!(p.verify_webhook_signature(body, &sig).is_ok());
    }

    #[test]
    fn test_webhook_signature_tampered_body() {
        let p = processor();
        let sig = PaymentProcessor::sign_webhook_payload(
            &SecretString::from("whsec_testing_9f2k"),
            b"original",
        );
        assert!(matches!(
            p.verify_webhook_signature(b"tampered", &sig),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_webhook_signature_not_hex() {
        let p = processor();
        assert!(matches!(
            p.verify_webhook_signature(b"body", "not hex at all"),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_cash_on_delivery_stays_pending() {
        let p = processor();
        let status = p.confirm("local_ref", PaymentMethod::Cash).await.unwrap();
        assert_eq!(status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_local_reference_for_non_gateway_method() {
        let p = processor();
        let intent = p
            .create_intent("ORD-1", "25.00".parse().unwrap(), PaymentMethod::BankTransfer)
            .await
            .unwrap();
        assert!(intent.reference.starts_with("local_"));
    }
}
