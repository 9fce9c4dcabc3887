use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }
}

/// Whether a status pair counts against the shared room pool.
pub fn holds_capacity(booking_status: &str, payment_status: &str) -> bool {
    matches!(booking_status, "pending" | "confirmed")
        && matches!(payment_status, "pending" | "paid")
}

/// Half-open stay overlap: [a_in, a_out) intersects [b_in, b_out). A
/// check-out day is free for the next check-in.
pub fn stays_overlap(
    a_in: NaiveDate,
    a_out: NaiveDate,
    b_in: NaiveDate,
    b_out: NaiveDate,
) -> bool {
    a_in < b_out && a_out > b_in
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub booking_ref: String,
    pub room_id: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub num_adults: i32,
    pub num_children: i32,
    pub extra_beds: i32,
    pub total_nights: i32,
    pub pricing_tier: String,
    pub rate_per_night: Decimal,
    pub room_subtotal: Decimal,
    pub extra_bed_charge: Decimal,
    pub duration_discount_percent: Decimal,
    pub duration_discount_amount: Decimal,
    pub coupon_id: Option<i64>,
    pub coupon_code: Option<String>,
    pub coupon_discount_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_status: String,
    pub booking_status: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub special_requests: Option<String>,
    pub admin_notes: Option<String>,
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn holds_capacity(&self) -> bool {
        holds_capacity(&self.booking_status, &self.payment_status)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid.as_str()
    }
}

/// Booking joined with its room, shaped for receipts and notifications.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingWithRoom {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub booking: Booking,
    pub room_name: String,
    pub room_slug: String,
}
