pub mod availability;
pub mod booking;
pub mod coupons;
pub mod payment;
pub mod pricing;
pub mod settings;
pub mod sweeper;
