//! Decimal price to base-unit conversion.
//!
//! Tool prices are stored as human-readable decimals (e.g., `"0.10"` USDC)
//! while payment requirements carry integer base units (e.g., `"100000"`).
//! The conversion goes through [`rust_decimal::Decimal`] so no binary
//! floating point is ever involved.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Errors produced while converting a decimal price.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The input is not a decimal number.
    #[error("invalid price {0:?}")]
    Invalid(String),
    /// The price is negative.
    #[error("price must not be negative: {0}")]
    Negative(String),
    /// The price has more fractional digits than the asset supports.
    #[error("price {price} has more than {decimals} fractional digits")]
    TooPrecise {
        /// The offending price.
        price: String,
        /// The asset's decimals.
        decimals: u32,
    },
    /// The scaled amount does not fit.
    #[error("price {0} overflows when scaled to base units")]
    Overflow(String),
    /// The network has no known default asset.
    #[error("no default asset for network {0}")]
    UnsupportedNetwork(String),
}

/// Converts a decimal price into an integer base-unit string.
///
/// A leading `$` is tolerated. Prices with more fractional digits than
/// `decimals` are rejected rather than rounded.
///
/// # Errors
///
/// Returns [`AmountError`] if the price is malformed, negative, too precise,
/// or overflows.
///
/// # Example
///
/// ```rust
/// use mcpay::amount::to_base_units;
///
/// assert_eq!(to_base_units("0.10", 6).unwrap(), "100000");
/// assert_eq!(to_base_units("$2", 6).unwrap(), "2000000");
/// ```
pub fn to_base_units(price: &str, decimals: u32) -> Result<String, AmountError> {
    let trimmed = price.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let value = Decimal::from_str(trimmed).map_err(|_| AmountError::Invalid(price.to_owned()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative(price.to_owned()));
    }

    let factor = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(|| AmountError::Overflow(price.to_owned()))?;
    let scaled = value
        .checked_mul(factor)
        .ok_or_else(|| AmountError::Overflow(price.to_owned()))?;
    if !scaled.fract().is_zero() {
        return Err(AmountError::TooPrecise {
            price: price.to_owned(),
            decimals,
        });
    }

    Ok(scaled.trunc().normalize().abs().to_string())
}

/// Returns `true` if `amount` is a non-empty string of ASCII digits.
#[must_use]
pub fn is_base_unit_amount(amount: &str) -> bool {
    !amount.is_empty() && amount.bytes().all(|b| b.is_ascii_digit())
}
