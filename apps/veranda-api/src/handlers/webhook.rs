use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Gateway webhook endpoint. The signature covers the raw body, so the body
/// is taken as a string and parsed only after verification. Handled and
/// unhandled events alike get a 200 so the gateway stops retrying.
pub async fn razorpay(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = state
        .gateway
        .verify_webhook_signature(body.as_bytes(), signature)
    {
        warn!(error = %e, "Webhook signature rejected");
        return Err(ApiError::SignatureRejected);
    }

    let payload: Value = serde_json::from_str(&body)
        .map_err(|_| ApiError::Validation("Malformed webhook payload".to_string()))?;
    let event = payload["event"].as_str().unwrap_or("").to_string();

    state.booking.handle_webhook_event(&event, &payload).await?;

    Ok(Json(json!({ "status": "ok" })))
}
