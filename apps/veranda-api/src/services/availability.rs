use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use veranda_db::repositories::booking_repo::BookingRepository;

use crate::services::settings::SettingsService;

/// Result of an availability probe for a date range.
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub available: bool,
    pub rooms_available: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AvailabilityService {
    pool: PgPool,
    bookings: BookingRepository,
    settings: SettingsService,
}

impl AvailabilityService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            bookings: BookingRepository::new(pool.clone()),
            settings: SettingsService::new(pool.clone()),
            pool,
        }
    }

    /// Advisory check against pooled capacity, then the per-room block list.
    /// The answer can go stale immediately; admission re-checks under a lock.
    pub async fn check(
        &self,
        room_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Availability> {
        let settings = self.settings.booking_settings().await?;
        let held = self.bookings.count_overlapping_holds(check_in, check_out).await?;
        let rooms_available = (settings.total_rooms - held).max(0);

        if rooms_available == 0 {
            return Ok(Availability {
                available: false,
                rooms_available: 0,
                reason: Some("No rooms available for the selected dates".to_string()),
            });
        }

        let blocked = self
            .bookings
            .count_blocked_dates(room_id, check_in, check_out)
            .await?;
        if blocked > 0 {
            return Ok(Availability {
                available: false,
                rooms_available,
                reason: Some("Selected dates are not available for this room".to_string()),
            });
        }

        Ok(Availability {
            available: true,
            rooms_available,
            reason: None,
        })
    }

    /// Dates within [from, to] on which the pool is exhausted or the room is
    /// blocked, for calendar rendering.
    pub async fn booked_dates(
        &self,
        room_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let settings = self.settings.booking_settings().await?;

        let mut dates: Vec<NaiveDate> = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT d::date FROM generate_series($1::date, $2::date, '1 day') AS d
             WHERE (
                 SELECT COUNT(*) FROM bookings
                 WHERE booking_status IN ('pending', 'confirmed')
                 AND payment_status IN ('pending', 'paid')
                 AND check_in <= d::date AND check_out > d::date
             ) >= $3",
        )
        .bind(from)
        .bind(to)
        .bind(settings.total_rooms)
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute fully booked dates")?;

        let blocked: Vec<NaiveDate> = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT blocked_date FROM blocked_dates
             WHERE room_id = $1 AND blocked_date >= $2 AND blocked_date <= $3",
        )
        .bind(room_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch blocked dates")?;

        dates.extend(blocked);
        dates.sort();
        dates.dedup();
        Ok(dates)
    }
}
