//! Fixed-point U256 arithmetic for keeper thresholds.
//!
//! Every threshold comparison happens between integers of the same scale:
//! - Health factor: 8 decimals (same as USD price feeds)
//! - Equity per share: WAD (18 decimals)
//! - Interest rates: RAY (27 decimals)
//!
//! Values are parsed from decimal strings with [`parse_units`] so config
//! thresholds never pass through floating point.

use alloy::primitives::U256;
use anyhow::{bail, Result};

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Health factor decimals (matches 8-decimal USD price feeds)
pub const HEALTH_FACTOR_DECIMALS: u8 = 8;

/// Health factor scale: 1e8
pub const HEALTH_FACTOR_SCALE: U256 = U256::from_limbs([100_000_000u64, 0, 0, 0]);

/// Decimals of a percentage expressed in RAY (1% = 1e25)
pub const PERCENT_RAY_DECIMALS: u8 = 25;

/// Equity-per-share decimals
pub const EPS_DECIMALS: u8 = 18;

/// Pre-computed powers of 10 for fast decimal conversion
const POW10: [u128; 39] = {
    let mut table = [1u128; 39];
    let mut i = 1;
    while i < 39 {
        table[i] = table[i - 1] * 10;
        i += 1;
    }
    table
};

/// Fast power of 10 lookup (up to 10^38)
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    if exp < 39 {
        U256::from(POW10[exp as usize])
    } else {
        U256::from(10u64).pow(U256::from(exp))
    }
}

/// `a * b / denominator`, saturating on overflow.
///
/// Returns `U256::MAX` when the denominator is zero.
#[inline(always)]
pub fn mul_div(a: U256, b: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::MAX;
    }
    match a.checked_mul(b) {
        Some(product) => product / denominator,
        None => U256::MAX,
    }
}

/// Health factor in 8 decimals: `collateral * 1e8 / debt`.
///
/// Returns `U256::MAX` if debt is zero.
#[inline(always)]
pub fn health_factor(collateral: U256, debt: U256) -> U256 {
    mul_div(collateral, HEALTH_FACTOR_SCALE, debt)
}

/// Equity per share in WAD: `equity * 1e18 / total_supply`.
///
/// Undefined (`None`) while no shares are outstanding.
#[inline(always)]
pub fn equity_per_share(equity: U256, total_supply: U256) -> Option<U256> {
    if total_supply.is_zero() {
        return None;
    }
    Some(mul_div(equity, WAD, total_supply))
}

/// Parse a non-negative decimal string into a fixed-point integer.
///
/// `parse_units("1.1", 8)` is `110_000_000`. More fractional digits than
/// `decimals` is an error rather than a silent truncation.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        bail!("Empty decimal value");
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        bail!("Invalid decimal value '{}'", value);
    }
    if fraction.len() > decimals as usize {
        bail!(
            "Decimal value '{}' has more than {} fractional digits",
            value,
            decimals
        );
    }

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10)?
    };
    let fraction_scaled = if fraction.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(fraction, 10)? * pow10(decimals - fraction.len() as u8)
    };

    whole
        .checked_mul(pow10(decimals))
        .and_then(|w| w.checked_add(fraction_scaled))
        .ok_or_else(|| anyhow::anyhow!("Decimal value '{}' overflows U256", value))
}

/// Render a fixed-point integer as a decimal string, trimming trailing zeros.
///
/// `format_units(110_000_000, 8)` is `"1.1"`.
pub fn format_units(value: U256, decimals: u8) -> String {
    if value == U256::MAX {
        return "∞".to_string();
    }
    let scale = pow10(decimals);
    let whole = value / scale;
    let fraction = value % scale;

    if fraction.is_zero() {
        return whole.to_string();
    }

    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Render a RAY rate as a percentage string (`4e25` → `"4"`).
pub fn format_ray_percent(rate: U256) -> String {
    format_units(rate, PERCENT_RAY_DECIMALS)
}
