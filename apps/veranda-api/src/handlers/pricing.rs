use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;

use crate::AppState;
use crate::error::{ApiError, Envelope, ok};
use crate::handlers::{parse_date, validate_stay};
use crate::services::pricing::PriceQuote;

#[derive(Deserialize)]
pub struct PriceRequest {
    pub room_id: i64,
    pub check_in: String,
    pub check_out: String,
    #[serde(default)]
    pub extra_beds: i32,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<PriceRequest>,
) -> Result<Json<Envelope<PriceQuote>>, ApiError> {
    let check_in = parse_date(&req.check_in)?;
    let check_out = parse_date(&req.check_out)?;

    let settings = state.settings.booking_settings().await?;
    let nights = validate_stay(check_in, check_out, Utc::now().date_naive(), &settings)?;

    let quote = state
        .pricing
        .quote(req.room_id, nights, req.extra_beds, req.coupon_code.as_deref())
        .await?;
    Ok(ok(quote))
}
