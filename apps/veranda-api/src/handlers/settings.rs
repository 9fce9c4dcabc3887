use axum::Json;
use axum::extract::State;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::AppState;
use crate::error::{ApiError, Envelope, ok};

#[derive(Serialize)]
pub struct PublicSettings {
    pub settings: Map<String, Value>,
}

pub async fn get(State(state): State<AppState>) -> Result<Json<Envelope<PublicSettings>>, ApiError> {
    let settings = state.settings.public_settings().await?;
    Ok(ok(PublicSettings { settings }))
}
