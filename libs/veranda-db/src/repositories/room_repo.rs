use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::room::Room;

#[derive(Debug, Clone)]
pub struct RoomRepository {
    pool: PgPool,
}

impl RoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_active(&self) -> Result<Vec<Room>> {
        sqlx::query_as::<_, Room>(
            "SELECT * FROM rooms WHERE status = 'active' ORDER BY display_order ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch active rooms")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Room>> {
        sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1 AND status = 'active'")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch room by ID")
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Room>> {
        sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE slug = $1 AND status = 'active'")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch room by slug")
    }
}
