use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use veranda_db::models::booking::BookingWithRoom;

use crate::AppState;
use crate::error::{ApiError, Envelope, ok_with_message};

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub booking: BookingWithRoom,
}

/// Client-side checkout callback. Safe to retry; a booking already paid via
/// the webhook returns the same confirmed state.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Envelope<VerifyResponse>>, ApiError> {
    let booking = state
        .booking
        .confirm_payment(
            &req.razorpay_order_id,
            &req.razorpay_payment_id,
            &req.razorpay_signature,
        )
        .await?;
    Ok(ok_with_message(
        VerifyResponse { booking },
        "Payment verified successfully",
    ))
}
