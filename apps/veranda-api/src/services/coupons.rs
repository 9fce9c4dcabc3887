use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use veranda_db::models::coupon::{Coupon, DiscountType};
use veranda_db::repositories::coupon_repo::CouponRepository;

use crate::services::pricing::round2;
use crate::services::settings::CURRENCY_SYMBOL;

/// A coupon that passed every rule, with its discount computed against the
/// candidate subtotal.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedCoupon {
    pub coupon_id: i64,
    pub coupon_code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub discount_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CouponOutcome {
    Valid(AppliedCoupon),
    Invalid { reason: String },
}

impl CouponOutcome {
    fn invalid(reason: impl Into<String>) -> Self {
        CouponOutcome::Invalid {
            reason: reason.into(),
        }
    }
}

/// Rule evaluation over a loaded coupon record. Read-only: usage is
/// incremented only when a booking is confirmed, never here.
///
/// Checks short-circuit in a fixed order: active status, validity window
/// (inclusive on both ends), usage limit, minimum nights, minimum amount,
/// room allow-list.
pub fn evaluate(
    coupon: &Coupon,
    room_id: i64,
    subtotal: Decimal,
    nights: i64,
    today: NaiveDate,
) -> CouponOutcome {
    if !coupon.is_active() {
        return CouponOutcome::invalid("Invalid coupon code");
    }

    if today < coupon.valid_from || today > coupon.valid_until {
        return CouponOutcome::invalid("Coupon has expired or is not yet active");
    }

    if coupon.usage_exhausted() {
        return CouponOutcome::invalid("Coupon usage limit reached");
    }

    if nights < i64::from(coupon.min_nights) {
        return CouponOutcome::invalid(format!(
            "Minimum {} night(s) required for this coupon",
            coupon.min_nights
        ));
    }

    if subtotal < coupon.min_amount {
        return CouponOutcome::invalid(format!(
            "Minimum booking amount of {CURRENCY_SYMBOL}{} required",
            coupon.min_amount
        ));
    }

    if let Some(allowed) = coupon.allowed_rooms() {
        if !allowed.contains(&room_id) {
            return CouponOutcome::invalid("Coupon not applicable for this room");
        }
    }

    let discount_type = match coupon.discount_type() {
        Ok(t) => t,
        Err(_) => return CouponOutcome::invalid("Invalid coupon code"),
    };

    let (discount_amount, discount_text) = match discount_type {
        DiscountType::Percentage => {
            let mut amount = subtotal * coupon.discount_value / Decimal::from(100);
            if let Some(cap) = coupon.max_discount {
                if amount > cap {
                    amount = cap;
                }
            }
            (amount, format!("{}% off", coupon.discount_value))
        }
        DiscountType::Fixed => {
            let amount = coupon.discount_value.min(subtotal);
            (
                amount,
                format!("{CURRENCY_SYMBOL}{} off", coupon.discount_value),
            )
        }
    };

    CouponOutcome::Valid(AppliedCoupon {
        coupon_id: coupon.id,
        coupon_code: coupon.code.clone(),
        discount_type,
        discount_value: coupon.discount_value,
        discount_amount: round2(discount_amount),
        discount_text,
        description: coupon.description.clone(),
    })
}

#[derive(Debug, Clone)]
pub struct CouponService {
    repo: CouponRepository,
}

impl CouponService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: CouponRepository::new(pool),
        }
    }

    /// Case-insensitive lookup followed by rule evaluation against today.
    pub async fn validate(
        &self,
        code: &str,
        room_id: i64,
        subtotal: Decimal,
        nights: i64,
    ) -> Result<CouponOutcome> {
        let normalized = code.trim().to_uppercase();
        let Some(coupon) = self.repo.get_by_code(&normalized).await? else {
            return Ok(CouponOutcome::invalid("Invalid coupon code"));
        };

        let today = Utc::now().date_naive();
        Ok(evaluate(&coupon, room_id, subtotal, nights, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_coupon() -> Coupon {
        Coupon {
            id: 7,
            code: "SAVE100".into(),
            description: None,
            discount_type: "fixed".into(),
            discount_value: Decimal::from(100),
            max_discount: None,
            min_nights: 5,
            min_amount: Decimal::from(1000),
            room_ids: None,
            valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            usage_limit: Some(10),
            used_count: 0,
            status: "active".into(),
            created_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn reason(outcome: CouponOutcome) -> String {
        match outcome {
            CouponOutcome::Invalid { reason } => reason,
            CouponOutcome::Valid(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn fixed_coupon_applies() {
        let outcome = evaluate(&base_coupon(), 1, Decimal::from(6300), 7, today());
        match outcome {
            CouponOutcome::Valid(applied) => {
                assert_eq!(applied.discount_amount, Decimal::from(100));
                assert_eq!(applied.coupon_id, 7);
            }
            CouponOutcome::Invalid { reason } => panic!("rejected: {reason}"),
        }
    }

    #[test]
    fn fixed_coupon_never_exceeds_subtotal() {
        let outcome = evaluate(&base_coupon(), 1, Decimal::from(80), 7, today());
        // min_amount rejects first with this subtotal; relax it.
        let mut c = base_coupon();
        c.min_amount = Decimal::ZERO;
        let outcome2 = evaluate(&c, 1, Decimal::from(80), 7, today());
        assert!(matches!(outcome, CouponOutcome::Invalid { .. }));
        match outcome2 {
            CouponOutcome::Valid(applied) => {
                assert_eq!(applied.discount_amount, Decimal::from(80));
            }
            CouponOutcome::Invalid { reason } => panic!("rejected: {reason}"),
        }
    }

    #[test]
    fn percentage_coupon_respects_cap() {
        let mut c = base_coupon();
        c.discount_type = "percentage".into();
        c.discount_value = Decimal::from(20);
        c.max_discount = Some(Decimal::from(500));
        match evaluate(&c, 1, Decimal::from(6000), 7, today()) {
            CouponOutcome::Valid(applied) => {
                // 20% of 6000 is 1200, capped at 500.
                assert_eq!(applied.discount_amount, Decimal::from(500));
            }
            CouponOutcome::Invalid { reason } => panic!("rejected: {reason}"),
        }
    }

    #[test]
    fn rejection_reasons_follow_check_order() {
        let mut c = base_coupon();
        c.status = "inactive".into();
        assert_eq!(
            reason(evaluate(&c, 1, Decimal::from(6000), 7, today())),
            "Invalid coupon code"
        );

        let c = base_coupon();
        let early = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(
            reason(evaluate(&c, 1, Decimal::from(6000), 7, early)),
            "Coupon has expired or is not yet active"
        );

        let mut c = base_coupon();
        c.used_count = 10;
        assert_eq!(
            reason(evaluate(&c, 1, Decimal::from(6000), 7, today())),
            "Coupon usage limit reached"
        );

        let c = base_coupon();
        assert_eq!(
            reason(evaluate(&c, 1, Decimal::from(6000), 4, today())),
            "Minimum 5 night(s) required for this coupon"
        );

        let c = base_coupon();
        assert!(reason(evaluate(&c, 1, Decimal::from(500), 7, today()))
            .starts_with("Minimum booking amount"));

        let mut c = base_coupon();
        c.room_ids = Some(serde_json::json!([2, 3]));
        assert_eq!(
            reason(evaluate(&c, 1, Decimal::from(6000), 7, today())),
            "Coupon not applicable for this room"
        );
    }

    #[test]
    fn validity_window_is_inclusive() {
        let c = base_coupon();
        let last_day = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let first_day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(
            evaluate(&c, 1, Decimal::from(6000), 7, last_day),
            CouponOutcome::Valid(_)
        ));
        assert!(matches!(
            evaluate(&c, 1, Decimal::from(6000), 7, first_day),
            CouponOutcome::Valid(_)
        ));
    }
}
