// Coupons: model, redemption checks and first-booking eligibility

pub mod handlers;
pub mod models;
pub mod validator;

pub use models::{Coupon, CouponContext, CouponRejection, DiscountType};
pub use self::validator::{check_redeemable, CouponError, CouponValidator};
