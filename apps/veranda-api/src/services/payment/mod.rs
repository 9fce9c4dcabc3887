pub mod razorpay;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Order created on the gateway side, referencing the amount in minor units
/// (paise for INR).
#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Payment gateway abstraction. One live implementation (Razorpay); tests
/// substitute their own.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Publishable key the frontend needs to open the checkout widget.
    fn key_id(&self) -> &str;

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayOrder>;

    /// Verify the signature returned by the client-side checkout callback.
    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;

    /// Verify a webhook delivery against the raw request body.
    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> Result<()>;
}
