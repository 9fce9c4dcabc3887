use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use veranda_db::models::booking::BookingWithRoom;

use crate::AppState;
use crate::error::{ApiError, Envelope, ok};

#[derive(Serialize)]
pub struct BookingDetail {
    pub booking: BookingWithRoom,
}

pub async fn by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<Envelope<BookingDetail>>, ApiError> {
    let booking = state.booking.booking_by_ref(reference.trim()).await?;
    Ok(ok(BookingDetail { booking }))
}
