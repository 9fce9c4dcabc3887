use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use chrono::Utc;
use serde::Deserialize;

use crate::AppState;
use crate::error::{ApiError, Envelope, ok_with_message};
use crate::handlers::{parse_date, validate_email, validate_phone, validate_stay};
use crate::services::booking::{OrderOutcome, OrderRequest};

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub room_id: i64,
    pub check_in: String,
    pub check_out: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    #[serde(default = "default_adults")]
    pub num_adults: i32,
    #[serde(default)]
    pub num_children: i32,
    #[serde(default)]
    pub extra_beds: i32,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

fn default_adults() -> i32 {
    1
}

pub async fn create(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Envelope<OrderOutcome>>, ApiError> {
    let guest_name = req.guest_name.trim().to_string();
    if guest_name.is_empty() {
        return Err(ApiError::Validation("Guest name is required".to_string()));
    }
    validate_email(&req.guest_email)?;
    validate_phone(&req.guest_phone)?;
    if req.num_adults < 1 {
        return Err(ApiError::Validation(
            "At least one adult is required".to_string(),
        ));
    }
    if req.num_children < 0 || req.extra_beds < 0 {
        return Err(ApiError::Validation("Invalid guest counts".to_string()));
    }

    let check_in = parse_date(&req.check_in)?;
    let check_out = parse_date(&req.check_out)?;

    let settings = state.settings.booking_settings().await?;
    validate_stay(check_in, check_out, Utc::now().date_naive(), &settings)?;

    let outcome = state
        .booking
        .create_order(OrderRequest {
            room_id: req.room_id,
            check_in,
            check_out,
            guest_name,
            guest_email: req.guest_email.trim().to_lowercase(),
            guest_phone: req.guest_phone.trim().to_string(),
            num_adults: req.num_adults,
            num_children: req.num_children,
            extra_beds: req.extra_beds,
            coupon_code: req.coupon_code,
            special_requests: req
                .special_requests
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            client_ip: Some(addr.ip().to_string()),
        })
        .await?;

    let message = match &outcome {
        OrderOutcome::FreeBooking { .. } => "Booking confirmed",
        OrderOutcome::PaymentRequired { .. } => "Order created",
    };
    Ok(ok_with_message(outcome, message))
}
