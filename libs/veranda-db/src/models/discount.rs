use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DurationDiscount {
    pub id: i64,
    pub min_nights: i32,
    pub discount_percent: Decimal,
    pub label: String,
    pub is_active: bool,
}

/// Pick the tier with the largest `min_nights` not exceeding the stay length.
/// At most one tier applies; inactive tiers never apply.
pub fn applicable_tier(tiers: &[DurationDiscount], nights: i64) -> Option<&DurationDiscount> {
    tiers
        .iter()
        .filter(|t| t.is_active && i64::from(t.min_nights) <= nights)
        .max_by_key(|t| t.min_nights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tier(id: i64, min_nights: i32, percent: i64, active: bool) -> DurationDiscount {
        DurationDiscount {
            id,
            min_nights,
            discount_percent: Decimal::from(percent),
            label: format!("Tier {min_nights}+"),
            is_active: active,
        }
    }

    #[test]
    fn highest_qualifying_threshold_wins() {
        let tiers = vec![tier(1, 3, 5, true), tier(2, 7, 10, true), tier(3, 30, 20, true)];
        assert_eq!(applicable_tier(&tiers, 2), None);
        assert_eq!(applicable_tier(&tiers, 3).unwrap().id, 1);
        assert_eq!(applicable_tier(&tiers, 7).unwrap().id, 2);
        assert_eq!(applicable_tier(&tiers, 29).unwrap().id, 2);
        assert_eq!(applicable_tier(&tiers, 45).unwrap().id, 3);
    }

    #[test]
    fn inactive_tiers_are_skipped() {
        let tiers = vec![tier(1, 3, 5, true), tier(2, 7, 10, false)];
        assert_eq!(applicable_tier(&tiers, 10).unwrap().id, 1);
    }

    #[test]
    fn order_of_tiers_does_not_matter() {
        let tiers = vec![tier(2, 30, 20, true), tier(1, 7, 10, true)];
        assert_eq!(applicable_tier(&tiers, 31).unwrap().id, 2);
    }
}
