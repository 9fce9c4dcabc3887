use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown discount type: {0}")]
pub struct ParseDiscountTypeError(String);

impl FromStr for DiscountType {
    type Err = ParseDiscountTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(ParseDiscountTypeError(other.to_string())),
        }
    }
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub max_discount: Option<Decimal>,
    pub min_nights: i32,
    pub min_amount: Decimal,
    pub room_ids: Option<serde_json::Value>,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn discount_type(&self) -> Result<DiscountType, ParseDiscountTypeError> {
        self.discount_type.parse()
    }

    /// Room allow-list, if one is configured. `None` means any room qualifies.
    pub fn allowed_rooms(&self) -> Option<Vec<i64>> {
        let value = self.room_ids.as_ref()?;
        let ids: Vec<i64> = value
            .as_array()?
            .iter()
            .filter_map(|v| v.as_i64())
            .collect();
        Some(ids)
    }

    pub fn usage_exhausted(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.used_count >= limit,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coupon(room_ids: Option<serde_json::Value>) -> Coupon {
        Coupon {
            id: 1,
            code: "SAVE100".into(),
            description: None,
            discount_type: "fixed".into(),
            discount_value: Decimal::from(100),
            max_discount: None,
            min_nights: 1,
            min_amount: Decimal::ZERO,
            room_ids,
            valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            usage_limit: None,
            used_count: 0,
            status: "active".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn allowed_rooms_parses_json_array() {
        assert_eq!(coupon(None).allowed_rooms(), None);
        assert_eq!(
            coupon(Some(json!([1, 3]))).allowed_rooms(),
            Some(vec![1, 3])
        );
    }

    #[test]
    fn usage_exhausted_only_with_limit() {
        let mut c = coupon(None);
        c.used_count = 1_000;
        assert!(!c.usage_exhausted());
        c.usage_limit = Some(1_000);
        assert!(c.usage_exhausted());
        c.usage_limit = Some(1_001);
        assert!(!c.usage_exhausted());
    }

    #[test]
    fn discount_type_parse_rejects_unknown() {
        assert_eq!(
            "percentage".parse::<DiscountType>().unwrap(),
            DiscountType::Percentage
        );
        assert!("bogus".parse::<DiscountType>().is_err());
    }
}
