use axum::Json;
use axum::extract::State;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{ApiError, Envelope, ok};
use crate::handlers::{parse_date, validate_stay};
use crate::services::availability::Availability;

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub room_id: i64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum AvailabilityResponse {
    Probe(Availability),
    Calendar { booked_dates: Vec<NaiveDate> },
}

/// Availability probe for a stay, or the fully-booked/blocked date list for
/// calendar rendering when `action` is `get_dates`.
pub async fn check(
    State(state): State<AppState>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<Envelope<AvailabilityResponse>>, ApiError> {
    if req.action.as_deref() == Some("get_dates") {
        let from = match &req.from {
            Some(value) => parse_date(value)?,
            None => Utc::now().date_naive(),
        };
        let to = match &req.to {
            Some(value) => parse_date(value)?,
            None => from + chrono::Duration::days(90),
        };
        if to < from {
            return Err(ApiError::Validation(
                "End date must not be before start date".to_string(),
            ));
        }
        let booked_dates = state.availability.booked_dates(req.room_id, from, to).await?;
        return Ok(ok(AvailabilityResponse::Calendar { booked_dates }));
    }

    let check_in = parse_date(
        req.check_in
            .as_deref()
            .ok_or_else(|| ApiError::Validation("check_in is required".to_string()))?,
    )?;
    let check_out = parse_date(
        req.check_out
            .as_deref()
            .ok_or_else(|| ApiError::Validation("check_out is required".to_string()))?,
    )?;

    let settings = state.settings.booking_settings().await?;
    validate_stay(check_in, check_out, Utc::now().date_naive(), &settings)?;

    let probe = state
        .availability
        .check(req.room_id, check_in, check_out)
        .await?;
    Ok(ok(AvailabilityResponse::Probe(probe)))
}
