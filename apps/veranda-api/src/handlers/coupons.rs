use axum::Json;
use axum::extract::State;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{ApiError, Envelope, ok, ok_with_message};
use crate::handlers::{parse_date, validate_stay};
use crate::services::coupons::{AppliedCoupon, CouponOutcome};
use crate::services::pricing::round2;

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub room_id: i64,
    pub check_in: String,
    pub check_out: String,
    #[serde(default)]
    pub extra_beds: i32,
}

/// A rejected coupon is a business answer, not an error: the endpoint
/// replies 200 with `valid: false` and the reason.
#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<AppliedCoupon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_total: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Standalone coupon check for the booking form. The discount is computed
/// against the stay priced without a coupon, exactly as order creation will.
pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<Envelope<ValidateResponse>>, ApiError> {
    let check_in = parse_date(&req.check_in)?;
    let check_out = parse_date(&req.check_out)?;

    let settings = state.settings.booking_settings().await?;
    let nights = validate_stay(check_in, check_out, Utc::now().date_naive(), &settings)?;

    let base = state
        .pricing
        .quote(req.room_id, nights, req.extra_beds, None)
        .await?;
    let after_duration = base.subtotal - base.duration_discount_amount;

    match state
        .coupons
        .validate(&req.code, req.room_id, after_duration, nights)
        .await?
    {
        CouponOutcome::Valid(coupon) => {
            let new_total = round2((after_duration - coupon.discount_amount).max(Decimal::ZERO));
            Ok(ok_with_message(
                ValidateResponse {
                    valid: true,
                    coupon: Some(coupon),
                    new_total: Some(new_total),
                    reason: None,
                },
                "Coupon applied",
            ))
        }
        CouponOutcome::Invalid { reason } => Ok(ok(ValidateResponse {
            valid: false,
            coupon: None,
            new_total: None,
            reason: Some(reason),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_coupon_is_a_payload_not_an_error() {
        let body = serde_json::to_value(ValidateResponse {
            valid: false,
            coupon: None,
            new_total: None,
            reason: Some("Coupon usage limit reached".into()),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "valid": false,
                "reason": "Coupon usage limit reached",
            })
        );
    }
}
