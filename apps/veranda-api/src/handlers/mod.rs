pub mod availability;
pub mod bookings;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod rooms;
pub mod settings;
pub mod webhook;

use chrono::NaiveDate;

use crate::error::ApiError;
use crate::services::settings::{ADVANCE_BOOKING_DAYS, BookingSettings};

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Invalid date format. Use YYYY-MM-DD".to_string()))
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') || !email.contains('.') {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_phone(phone: &str) -> Result<(), ApiError> {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !(10..=12).contains(&digits) {
        return Err(ApiError::Validation("Invalid phone number".to_string()));
    }
    Ok(())
}

/// Date-range validation shared by every stay-taking endpoint. Returns the
/// stay length in nights.
pub(crate) fn validate_stay(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
    settings: &BookingSettings,
) -> Result<i64, ApiError> {
    if check_out <= check_in {
        return Err(ApiError::Validation(
            "Check-out date must be after check-in date".to_string(),
        ));
    }
    if check_in < today {
        return Err(ApiError::Validation(
            "Check-in date cannot be in the past".to_string(),
        ));
    }
    if check_in > today + chrono::Duration::days(ADVANCE_BOOKING_DAYS) {
        return Err(ApiError::Validation(format!(
            "Bookings can be made up to {ADVANCE_BOOKING_DAYS} days in advance"
        )));
    }

    let nights = (check_out - check_in).num_days();
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

    Ok(nights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn settings() -> BookingSettings {
        BookingSettings {
            extra_bed_price: Decimal::from(600),
            min_nights: 1,
            max_nights: 90,
            total_rooms: 18,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(parse_date("2025-06-15").unwrap(), day(2025, 6, 15));
        assert_eq!(parse_date(" 2025-06-15 ").unwrap(), day(2025, 6, 15));
        assert!(parse_date("15/06/2025").is_err());
        assert!(parse_date("2025-02-30").is_err());
    }

    #[test]
    fn stay_must_be_forward_and_within_horizon() {
        let today = day(2025, 6, 1);
        let s = settings();

        assert_eq!(
            validate_stay(day(2025, 6, 10), day(2025, 6, 17), today, &s).unwrap(),
            7
        );
        // same-day checkout
        assert!(validate_stay(day(2025, 6, 10), day(2025, 6, 10), today, &s).is_err());
        // reversed
        assert!(validate_stay(day(2025, 6, 17), day(2025, 6, 10), today, &s).is_err());
        // past check-in
        assert!(validate_stay(day(2025, 5, 30), day(2025, 6, 2), today, &s).is_err());
        // check-in today is fine
        assert!(validate_stay(today, day(2025, 6, 2), today, &s).is_ok());
        // beyond the advance horizon
        assert!(validate_stay(day(2026, 1, 1), day(2026, 1, 5), today, &s).is_err());
    }

    #[test]
    fn stay_length_bounds_come_from_settings() {
        let today = day(2025, 6, 1);
        let mut s = settings();
        s.min_nights = 2;
        s.max_nights = 5;
        assert!(validate_stay(day(2025, 6, 10), day(2025, 6, 11), today, &s).is_err());
        assert!(validate_stay(day(2025, 6, 10), day(2025, 6, 16), today, &s).is_err());
        assert_eq!(
            validate_stay(day(2025, 6, 10), day(2025, 6, 13), today, &s).unwrap(),
            3
        );
    }

    #[test]
    fn contact_field_checks() {
        assert!(validate_email("guest@example.com").is_ok());
        assert!(validate_email("bad-email").is_err());
        assert!(validate_phone("+91 98765 43210").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("1234567890123456").is_err());
    }
}
