//! Data models for the coupon board.
//!
//! Field names serialize in camelCase to match the front-end contract.

mod coupon;
mod request;

pub use coupon::*;
pub use request::*;
