use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use veranda_db::models::room::Room;

use crate::AppState;
use crate::error::{ApiError, Envelope, ok};

#[derive(Serialize)]
pub struct RoomList {
    pub rooms: Vec<Room>,
}

#[derive(Serialize)]
pub struct RoomDetail {
    pub room: Room,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Envelope<RoomList>>, ApiError> {
    let rooms = state.rooms.get_active().await?;
    Ok(ok(RoomList { rooms }))
}

pub async fn by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Envelope<RoomDetail>>, ApiError> {
    let room = state
        .rooms
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Room not found".to_string()))?;
    Ok(ok(RoomDetail { room }))
}
