pub mod booking;
pub mod coupon;
pub mod discount;
pub mod room;
