use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

/// How long an unpaid hold keeps its room before the sweeper releases it.
pub const HOLD_TIMEOUT_MINUTES: i64 = 15;
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// Expiry decision for a candidate hold. Strictly past the timeout, so a
/// hold created exactly at the boundary survives one more sweep.
fn hold_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, timeout_minutes: i64) -> bool {
    now - created_at > chrono::Duration::minutes(timeout_minutes)
}

#[derive(Debug, Clone)]
pub struct SweeperService {
    pool: PgPool,
    timeout_minutes: i64,
}

impl SweeperService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout_minutes: HOLD_TIMEOUT_MINUTES,
        }
    }

    /// Release expired unpaid holds. Candidates are locked with SKIP LOCKED,
    /// so a hold mid-confirmation is left to the payment path; a hold that
    /// got paid between expiry and the sweep fails the status filter and is
    /// never a candidate at all.
    pub async fn sweep(&self) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open sweep transaction")?;

        let candidates: Vec<(i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, created_at FROM bookings
             WHERE payment_status = 'pending' AND booking_status = 'pending'
             FOR UPDATE SKIP LOCKED",
        )
        .fetch_all(&mut *tx)
        .await
        .context("Failed to fetch sweep candidates")?;

        let now = Utc::now();
        let expired: Vec<i64> = candidates
            .into_iter()
            .filter(|(_, created_at)| hold_expired(*created_at, now, self.timeout_minutes))
            .map(|(id, _)| id)
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE bookings
             SET payment_status = 'failed',
                 booking_status = 'cancelled',
                 admin_notes = CONCAT(COALESCE(admin_notes || E'\\n', ''), $1)
             WHERE id = ANY($2)",
        )
        .bind(format!(
            "Auto-cancelled: payment timeout after {} minutes",
            self.timeout_minutes
        ))
        .bind(&expired)
        .execute(&mut *tx)
        .await
        .context("Failed to sweep expired holds")?;

        tx.commit()
            .await
            .context("Failed to commit sweep transaction")?;

        Ok(result.rows_affected())
    }

    /// Periodic sweep loop, spawned alongside the server.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match self.sweep().await {
                Ok(0) => {}
                Ok(released) => info!(released, "Released expired booking holds"),
                Err(e) => error!(error = ?e, "Hold sweep failed"),
            }
        }
    }
}
