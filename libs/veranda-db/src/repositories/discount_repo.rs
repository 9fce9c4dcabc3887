use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::discount::DurationDiscount;

#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: PgPool,
}

impl DiscountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_active(&self) -> Result<Vec<DurationDiscount>> {
        sqlx::query_as::<_, DurationDiscount>(
            "SELECT * FROM duration_discounts WHERE is_active = TRUE ORDER BY min_nights ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch duration discounts")
    }
}
