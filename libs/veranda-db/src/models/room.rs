use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_per_night: Decimal,
    pub max_adults: i32,
    pub max_children: i32,
    pub display_order: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    /// Extra beds raise the adult capacity, one adult per bed.
    pub fn max_adults_with_beds(&self, extra_beds: i32) -> i32 {
        self.max_adults + extra_beds
    }
}
