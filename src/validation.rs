// Validation utilities module
// Provides custom validation functions for booking identifiers and coupon codes

use regex::Regex;
use std::sync::OnceLock;
use validator::ValidationError;

fn confirmation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^TRG-[A-Z0-9]{6}$").expect("confirmation pattern compiles"))
}

fn coupon_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{2,32}$").expect("coupon pattern compiles"))
}

/// Checks the customer-facing confirmation number format: `TRG-` + 6 of `[A-Z0-9]`
pub fn is_confirmation_number(value: &str) -> bool {
    confirmation_pattern().is_match(value)
}

/// Validates that a coupon code only uses letters, digits, `_` and `-`
pub fn validate_coupon_code(code: &str) -> Result<(), ValidationError> {
    if coupon_pattern().is_match(code.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_coupon_code"))
    }
}

/// Coupon codes are stored upper-case; lookups go through this
pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_uppercase()
}
