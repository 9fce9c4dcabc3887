use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::booking::BookingWithRoom;

#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_ref(&self, booking_ref: &str) -> Result<Option<BookingWithRoom>> {
        sqlx::query_as::<_, BookingWithRoom>(
            "SELECT b.*, r.name AS room_name, r.slug AS room_slug
             FROM bookings b
             JOIN rooms r ON b.room_id = r.id
             WHERE b.booking_ref = $1",
        )
        .bind(booking_ref)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch booking by reference")
    }

    pub async fn get_by_order_id(&self, order_id: &str) -> Result<Option<BookingWithRoom>> {
        sqlx::query_as::<_, BookingWithRoom>(
            "SELECT b.*, r.name AS room_name, r.slug AS room_slug
             FROM bookings b
             JOIN rooms r ON b.room_id = r.id
             WHERE b.gateway_order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch booking by gateway order ID")
    }

    pub async fn get_by_payment_id(&self, payment_id: &str) -> Result<Option<BookingWithRoom>> {
        sqlx::query_as::<_, BookingWithRoom>(
            "SELECT b.*, r.name AS room_name, r.slug AS room_slug
             FROM bookings b
             JOIN rooms r ON b.room_id = r.id
             WHERE b.gateway_payment_id = $1",
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch booking by gateway payment ID")
    }

    /// Count bookings holding pool capacity that overlap the half-open
    /// [check_in, check_out) range.
    pub async fn count_overlapping_holds(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bookings
             WHERE booking_status IN ('pending', 'confirmed')
             AND payment_status IN ('pending', 'paid')
             AND check_in < $1 AND check_out > $2",
        )
        .bind(check_out)
        .bind(check_in)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count overlapping bookings")
    }

    pub async fn count_blocked_dates(
        &self,
        room_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM blocked_dates
             WHERE room_id = $1 AND blocked_date >= $2 AND blocked_date < $3",
        )
        .bind(room_id)
        .bind(check_in)
        .bind(check_out)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count blocked dates")
    }
}
