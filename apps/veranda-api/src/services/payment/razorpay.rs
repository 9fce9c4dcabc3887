use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{debug, warn};

use super::{GatewayOrder, PaymentGateway};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.razorpay.com/v1";

#[derive(Clone)]
pub struct RazorpayGateway {
    key_id: String,
    key_secret: String,
    webhook_secret: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for RazorpayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayGateway")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: Option<GatewayErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    description: Option<String>,
}

impl RazorpayGateway {
    pub fn new(key_id: String, key_secret: String, webhook_secret: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            key_id,
            key_secret,
            webhook_secret,
            client,
        })
    }

    fn hmac_matches(secret: &str, message: &[u8], signature_hex: &str) -> bool {
        let Ok(expected) = hex::decode(signature_hex) else {
            return false;
        };
        // verify_slice is constant time over the digest.
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(message);
        mac.verify_slice(&expected).is_ok()
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayOrder> {
        let body = json!({
            "amount": amount_minor,
            "currency": currency,
            "receipt": receipt,
            "notes": notes,
        });

        let response = self
            .client
            .post(format!("{API_BASE}/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .context("Failed to reach payment gateway")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<GatewayErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.description)
                .unwrap_or_else(|| format!("HTTP {status}"));
            warn!(%status, detail, "Gateway rejected order creation");
            bail!("Gateway order creation failed: {detail}");
        }

        let order: OrderResponse = response
            .json()
            .await
            .context("Failed to parse gateway order response")?;
        debug!(order_id = %order.id, amount = order.amount, "Gateway order created");

        Ok(GatewayOrder {
            order_id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
        })
    }

    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let message = format!("{order_id}|{payment_id}");
        Self::hmac_matches(&self.key_secret, message.as_bytes(), signature)
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> Result<()> {
        let signature = signature.ok_or_else(|| anyhow!("Missing webhook signature header"))?;
        if !Self::hmac_matches(&self.webhook_secret, payload, signature) {
            bail!("Webhook signature mismatch");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RazorpayGateway {
        RazorpayGateway::new(
            "rzp_test_key".into(),
            "secret".into(),
            "whsecret".into(),
        )
        .unwrap()
    }

    fn sign(secret: &str, message: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn payment_signature_roundtrip() {
        let g = gateway();
        let sig = sign("secret", b"order_abc|pay_xyz");
        assert!(g.verify_payment_signature("order_abc", "pay_xyz", &sig));
    }

    #[test]
    fn tampered_payment_id_rejected() {
        let g = gateway();
        let sig = sign("secret", b"order_abc|pay_xyz");
        assert!(!g.verify_payment_signature("order_abc", "pay_other", &sig));
    }

    #[test]
    fn malformed_hex_rejected() {
        let g = gateway();
        assert!(!g.verify_payment_signature("order_abc", "pay_xyz", "not-hex!"));
    }

    #[test]
    fn webhook_signature_verified_against_raw_body() {
        let g = gateway();
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign("whsecret", body);
        assert!(g.verify_webhook_signature(body, Some(&sig)).is_ok());
        assert!(g.verify_webhook_signature(body, Some("deadbeef")).is_err());
        assert!(g.verify_webhook_signature(body, None).is_err());
    }
}
