use anyhow::Result;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sqlx::PgPool;
use veranda_db::models::discount::{DurationDiscount, applicable_tier};
use veranda_db::models::room::Room;
use veranda_db::repositories::discount_repo::DiscountRepository;
use veranda_db::repositories::room_repo::RoomRepository;

use crate::error::ApiError;
use crate::services::coupons::{AppliedCoupon, CouponOutcome, CouponService};
use crate::services::settings::{BookingSettings, SettingsService};

pub const MAX_EXTRA_BEDS: i32 = 2;

/// Round to two decimal places, midpoint away from zero.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakdownLine {
    pub label: String,
    pub amount: Decimal,
}

/// Full price quote for a candidate stay. Every intermediate figure is
/// retained so it can be snapshotted onto the booking row at admission time.
#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    pub room_id: i64,
    pub nights: i64,
    pub rate_per_night: Decimal,
    pub room_subtotal: Decimal,
    pub extra_beds: i32,
    pub extra_bed_charge: Decimal,
    pub subtotal: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_tier: Option<String>,
    pub duration_discount_percent: Decimal,
    pub duration_discount_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<AppliedCoupon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_error: Option<String>,
    pub total: Decimal,
    pub breakdown: Vec<BreakdownLine>,
}

/// Apply the duration tier to a pre-discount amount. Returns the tier label,
/// percent and the discounted amount.
pub fn duration_pricing(
    tiers: &[DurationDiscount],
    nights: i64,
    pre_discount: Decimal,
) -> (Option<String>, Decimal, Decimal) {
    match applicable_tier(tiers, nights) {
        Some(tier) => {
            let amount = round2(pre_discount * tier.discount_percent / Decimal::from(100));
            (Some(tier.label.clone()), tier.discount_percent, amount)
        }
        None => (None, Decimal::ZERO, Decimal::ZERO),
    }
}

/// Pure quote assembly. Steps run in a fixed order: room subtotal, extra-bed
/// charge, duration tier on the combined amount, coupon on what remains, then
/// the total clamped at zero and rounded.
pub fn assemble_quote(
    room: &Room,
    nights: i64,
    extra_beds: i32,
    settings: &BookingSettings,
    tiers: &[DurationDiscount],
    coupon: Option<AppliedCoupon>,
    coupon_error: Option<String>,
) -> PriceQuote {
    let extra_beds = extra_beds.clamp(0, MAX_EXTRA_BEDS);
    let rate_per_night = room.price_per_night;
    let room_subtotal = round2(rate_per_night * Decimal::from(nights));
    let extra_bed_charge = round2(
        settings.extra_bed_price * Decimal::from(extra_beds) * Decimal::from(nights),
    );
    let subtotal = room_subtotal + extra_bed_charge;

    let (duration_tier, duration_discount_percent, duration_discount_amount) =
        duration_pricing(tiers, nights, subtotal);
    let after_duration = subtotal - duration_discount_amount;

    let coupon_discount = coupon
        .as_ref()
        .map(|c| c.discount_amount)
        .unwrap_or(Decimal::ZERO);

    let total = round2((after_duration - coupon_discount).max(Decimal::ZERO));

    let mut breakdown = vec![BreakdownLine {
        label: format!("{} x {} night(s)", room.name, nights),
        amount: room_subtotal,
    }];
    if extra_bed_charge > Decimal::ZERO {
        breakdown.push(BreakdownLine {
            label: format!("Extra bed x {extra_beds}"),
            amount: extra_bed_charge,
        });
    }
    if duration_discount_amount > Decimal::ZERO {
        let label = duration_tier
            .clone()
            .unwrap_or_else(|| "Duration discount".to_string());
        breakdown.push(BreakdownLine {
            label: format!("{label} (-{duration_discount_percent}%)"),
            amount: -duration_discount_amount,
        });
    }
    if let Some(applied) = &coupon {
        breakdown.push(BreakdownLine {
            label: format!("Coupon {} ({})", applied.coupon_code, applied.discount_text),
            amount: -applied.discount_amount,
        });
    }
    breakdown.push(BreakdownLine {
        label: "Total".to_string(),
        amount: total,
    });

    PriceQuote {
        room_id: room.id,
        nights,
        rate_per_night,
        room_subtotal,
        extra_beds,
        extra_bed_charge,
        subtotal,
        duration_tier,
        duration_discount_percent,
        duration_discount_amount,
        coupon,
        coupon_error,
        total,
        breakdown,
    }
}

#[derive(Debug, Clone)]
pub struct PricingService {
    rooms: RoomRepository,
    discounts: DiscountRepository,
    settings: SettingsService,
    coupons: CouponService,
}

impl PricingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            rooms: RoomRepository::new(pool.clone()),
            discounts: DiscountRepository::new(pool.clone()),
            settings: SettingsService::new(pool.clone()),
            coupons: CouponService::new(pool),
        }
    }

    /// Quote a stay. An invalid coupon does not fail the quote; the rejection
    /// reason rides along in `coupon_error` so the frontend can surface it.
    pub async fn quote(
        &self,
        room_id: i64,
        nights: i64,
        extra_beds: i32,
        coupon_code: Option<&str>,
    ) -> Result<PriceQuote, ApiError> {
        let settings = self.settings.booking_settings().await?;
        if nights < settings.min_nights {
            return Err(ApiError::Validation(format!(
                "Minimum booking is {} night(s)",
                settings.min_nights
            )));
        }
        if nights > settings.max_nights {
            return Err(ApiError::Validation(format!(
                "Maximum booking is {} night(s)",
                settings.max_nights
            )));
        }

        let room = self
            .rooms
            .get_by_id(room_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Room not found".to_string()))?;

        let tiers = self.discounts.get_active().await?;

        // The coupon is evaluated against the post-duration amount, so the
        // two discounts never compound on the same base.
        let base = assemble_quote(&room, nights, extra_beds, &settings, &tiers, None, None);
        let after_duration = base.subtotal - base.duration_discount_amount;

        let (coupon, coupon_error) = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                match self
                    .coupons
                    .validate(code, room_id, after_duration, nights)
                    .await?
                {
                    CouponOutcome::Valid(applied) => (Some(applied), None),
                    CouponOutcome::Invalid { reason } => (None, Some(reason)),
                }
            }
            None => (None, None),
        };

        Ok(assemble_quote(
            &room,
            nights,
            extra_beds,
            &settings,
            &tiers,
            coupon,
            coupon_error,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veranda_db::models::coupon::DiscountType;

    fn room(price: i64) -> Room {
        Room {
            id: 1,
            name: "Deluxe Suite".into(),
            slug: "deluxe-suite".into(),
            description: None,
            price_per_night: Decimal::from(price),
            max_adults: 2,
            max_children: 1,
            display_order: 1,
            status: "active".into(),
            created_at: Utc::now(),
        }
    }

    fn settings() -> BookingSettings {
        BookingSettings {
            extra_bed_price: Decimal::from(600),
            min_nights: 1,
            max_nights: 90,
            total_rooms: 18,
        }
    }

    fn tiers() -> Vec<DurationDiscount> {
        vec![
            DurationDiscount {
                id: 1,
                min_nights: 7,
                discount_percent: Decimal::from(10),
                label: "Weekly stay".into(),
                is_active: true,
            },
            DurationDiscount {
                id: 2,
                min_nights: 30,
                discount_percent: Decimal::from(20),
                label: "Monthly stay".into(),
                is_active: true,
            },
        ]
    }

    fn fixed_coupon(amount: i64) -> AppliedCoupon {
        AppliedCoupon {
            coupon_id: 7,
            coupon_code: "SAVE100".into(),
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::from(amount),
            discount_amount: Decimal::from(amount),
            discount_text: format!("₹{amount} off"),
            description: None,
        }
    }

    #[test]
    fn seven_night_stay_with_tier_and_fixed_coupon() {
        let quote = assemble_quote(
            &room(1000),
            7,
            0,
            &settings(),
            &tiers(),
            Some(fixed_coupon(100)),
            None,
        );
        assert_eq!(quote.room_subtotal, Decimal::from(7000));
        assert_eq!(quote.duration_discount_amount, Decimal::from(700));
        assert_eq!(quote.coupon.as_ref().unwrap().discount_amount, Decimal::from(100));
        assert_eq!(quote.total, Decimal::from(6200));
    }

    #[test]
    fn extra_beds_are_clamped_and_charged_per_night() {
        let quote = assemble_quote(&room(1000), 3, 5, &settings(), &[], None, None);
        assert_eq!(quote.extra_beds, 2);
        // 600 * 2 beds * 3 nights
        assert_eq!(quote.extra_bed_charge, Decimal::from(3600));
        assert_eq!(quote.total, Decimal::from(6600));
    }

    #[test]
    fn total_never_goes_negative() {
        let quote = assemble_quote(
            &room(100),
            1,
            0,
            &settings(),
            &[],
            Some(fixed_coupon(500)),
            None,
        );
        assert_eq!(quote.total, Decimal::ZERO);
    }

    #[test]
    fn no_tier_below_threshold() {
        let quote = assemble_quote(&room(1000), 6, 0, &settings(), &tiers(), None, None);
        assert_eq!(quote.duration_tier, None);
        assert_eq!(quote.total, Decimal::from(6000));
    }

    #[test]
    fn longer_stays_never_cost_more_per_night() {
        let mut last_rate = Decimal::MAX;
        for nights in 1..=35 {
            let quote = assemble_quote(&room(1000), nights, 0, &settings(), &tiers(), None, None);
            let effective = quote.total / Decimal::from(nights);
            assert!(
                effective <= last_rate,
                "effective rate rose at {nights} nights"
            );
            last_rate = effective;
        }
    }

    #[test]
    fn breakdown_ends_with_total() {
        let quote = assemble_quote(
            &room(1000),
            7,
            1,
            &settings(),
            &tiers(),
            Some(fixed_coupon(100)),
            None,
        );
        let last = quote.breakdown.last().unwrap();
        assert_eq!(last.label, "Total");
        assert_eq!(last.amount, quote.total);
        let sum: Decimal = quote.breakdown[..quote.breakdown.len() - 1]
            .iter()
            .map(|l| l.amount)
            .sum();
        assert_eq!(round2(sum), quote.total);
    }
}
