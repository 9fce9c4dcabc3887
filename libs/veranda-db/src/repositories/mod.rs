pub mod booking_repo;
pub mod coupon_repo;
pub mod discount_repo;
pub mod room_repo;
pub mod settings_repo;
