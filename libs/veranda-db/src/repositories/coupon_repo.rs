use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::coupon::Coupon;

#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Codes are stored upper-case; callers normalize before lookup.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch coupon by code")
    }
}
