use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde_json::{Map, Value, json};
use sqlx::PgPool;
use veranda_db::repositories::settings_repo::SettingsRepository;

pub const CURRENCY: &str = "INR";
pub const CURRENCY_SYMBOL: &str = "₹";
pub const ADVANCE_BOOKING_DAYS: i64 = 180;

/// Business settings consumed by pricing and availability. Always read fresh
/// from the store; administrators edit these out-of-band.
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub extra_bed_price: Decimal,
    pub min_nights: i64,
    pub max_nights: i64,
    pub total_rooms: i64,
}

#[derive(Debug, Clone)]
pub struct SettingsService {
    repo: SettingsRepository,
}

impl SettingsService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: SettingsRepository::new(pool),
        }
    }

    pub async fn booking_settings(&self) -> Result<BookingSettings> {
        let extra_bed_price = self
            .repo
            .get_or("extra_bed_price", "600")
            .await?
            .parse::<Decimal>()
            .context("extra_bed_price setting is not a number")?;
        let min_nights = self
            .repo
            .get_or("min_booking_nights", "1")
            .await?
            .parse::<i64>()
            .context("min_booking_nights setting is not a number")?;
        let max_nights = self
            .repo
            .get_or("max_booking_nights", "90")
            .await?
            .parse::<i64>()
            .context("max_booking_nights setting is not a number")?;
        let total_rooms = self
            .repo
            .get_or("total_rooms", "18")
            .await?
            .parse::<i64>()
            .context("total_rooms setting is not a number")?;

        Ok(BookingSettings {
            extra_bed_price,
            min_nights,
            max_nights,
            total_rooms,
        })
    }

    /// The subset of settings safe to expose to the public frontend.
    pub async fn public_settings(&self) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for key in [
            "extra_bed_price",
            "min_booking_nights",
            "max_booking_nights",
        ] {
            if let Some(value) = self.repo.get(key).await? {
                out.insert(key.to_string(), Value::String(value));
            }
        }

        out.entry("extra_bed_price")
            .or_insert_with(|| json!("600"));
        out.insert("currency".to_string(), json!(CURRENCY));
        out.insert("currency_symbol".to_string(), json!(CURRENCY_SYMBOL));

        Ok(out)
    }
}
