//! Fixed-point arithmetic for 18-decimal amounts, prices and ratios.
//!
//! Every multiply that can exceed 128 bits goes through a `U256` intermediate
//! so the engine is exact for amounts up to 1e27 and prices up to 1e30. All
//! division truncates toward zero; the liquidation math depends on that
//! bit-for-bit.

use primitive_types::U256;

use crate::error::{Error, Result};
use crate::utils::constants::{DECIMAL_PRECISION, NOMINAL_PRICE};

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: u128, b: u128) -> Result<u128> {
    a.checked_mul(b).ok_or(Error::Overflow {
        operation: format!("{} * {}", a, b),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIDENED OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert a 256-bit intermediate back to u128, rejecting values that do not fit
pub(crate) fn narrow(value: U256, operation: &str) -> Result<u128> {
    if value.bits() > 128 {
        return Err(Error::Overflow {
            operation: operation.to_string(),
        });
    }
    Ok(value.as_u128())
}

/// Compute `a * b / denominator` truncating, with a 256-bit intermediate.
///
/// The product of two u128 values always fits in 256 bits, so the multiply
/// itself cannot overflow; only a quotient above `u128::MAX` is an error.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(Error::DivisionByZero {
            operation: format!("({} * {}) / 0", a, b),
        });
    }
    let product = U256::from(a) * U256::from(b);
    narrow(
        product / U256::from(denominator),
        &format!("({} * {}) / {}", a, b, denominator),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUATION
// ═══════════════════════════════════════════════════════════════════════════════

/// USD value of a collateral amount at the given price, both 18-decimal:
/// `amount * price / 1e18`, truncating.
///
/// A zero price yields a zero value (the oracle reporting zero is handled by
/// callers, not here). The result must itself fit in u128; engine callers
/// only value amounts that have already been divided down, so the supported
/// input ranges never reach that limit on a live path.
pub fn usd_value(amount: u128, price: u128) -> Result<u128> {
    mul_div(amount, price, DECIMAL_PRECISION)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL RATIOS
// ═══════════════════════════════════════════════════════════════════════════════

/// Individual collateral ratio: `usd_value(collateral, price) * 1e18 /
/// composite_debt`, with both truncating division steps preserved exactly.
///
/// A zero composite debt (only possible for nonexistent or closed Troves) is
/// treated as infinitely safe and returns `u128::MAX` instead of dividing by
/// zero.
pub fn compute_icr(collateral: u128, composite_debt: u128, price: u128) -> Result<u128> {
    if composite_debt == 0 {
        return Ok(u128::MAX);
    }
    let value = U256::from(collateral) * U256::from(price) / U256::from(DECIMAL_PRECISION);
    // value * 1e18 <= collateral * price, so the second multiply stays in range
    let ratio = value * U256::from(DECIMAL_PRECISION) / U256::from(composite_debt);
    narrow(ratio, "compute_icr")
}

/// Nominal ICR: the ICR at the fixed reference price, used as the price-stable
/// ordering key for the sorted registry.
pub fn compute_nominal_icr(collateral: u128, composite_debt: u128) -> Result<u128> {
    compute_icr(collateral, composite_debt, NOMINAL_PRICE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::{MAX_SUPPORTED_AMOUNT, MAX_SUPPORTED_PRICE};

    #[test]
    fn test_safe_arithmetic() {
        assert!(safe_add(1, 2).is_ok());
        assert!(safe_add(u128::MAX, 1).is_err());

        assert!(safe_sub(5, 3).is_ok());
        assert!(safe_sub(3, 5).is_err());

        assert!(safe_mul(100, 200).is_ok());
        assert!(safe_mul(u128::MAX, 2).is_err());
    }

    #[test]
    fn test_mul_div_truncates() {
        assert_eq!(mul_div(7, 3, 2).unwrap(), 10);
        assert_eq!(mul_div(1, 1, 3).unwrap(), 0);
        assert!(mul_div(1, 1, 0).is_err());
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // a * b overflows u128 but the quotient fits
        let a = 10u128.pow(27);
        let b = 10u128.pow(30);
        assert_eq!(mul_div(a, b, b).unwrap(), a);
    }

    #[test]
    fn test_usd_value_basic() {
        // 10 FIL at $200 = $2000
        let value = usd_value(10 * DECIMAL_PRECISION, 200 * DECIMAL_PRECISION).unwrap();
        assert_eq!(value, 2_000 * DECIMAL_PRECISION);

        assert_eq!(usd_value(123, 0).unwrap(), 0);
        assert_eq!(usd_value(0, 123).unwrap(), 0);
    }

    #[test]
    fn test_usd_value_supported_ranges() {
        // The multiply is widened; results at the extreme corners of the
        // supported range either fit or fail cleanly, never wrap.
        assert!(usd_value(MAX_SUPPORTED_AMOUNT, 10u128.pow(29)).is_ok());
        assert!(matches!(
            usd_value(MAX_SUPPORTED_AMOUNT, MAX_SUPPORTED_PRICE),
            Err(Error::Overflow { .. })
        ));
    }

    #[test]
    fn test_icr_basic() {
        // 10 FIL at $200 against $1000 composite debt = 200%
        let icr = compute_icr(
            10 * DECIMAL_PRECISION,
            1_000 * DECIMAL_PRECISION,
            200 * DECIMAL_PRECISION,
        )
        .unwrap();
        assert_eq!(icr, 2 * DECIMAL_PRECISION);
    }

    #[test]
    fn test_icr_zero_debt_is_maximal() {
        let icr = compute_icr(DECIMAL_PRECISION, 0, 200 * DECIMAL_PRECISION).unwrap();
        assert_eq!(icr, u128::MAX);
    }

    #[test]
    fn test_icr_zero_price() {
        let icr = compute_icr(DECIMAL_PRECISION, DECIMAL_PRECISION, 0).unwrap();
        assert_eq!(icr, 0);
    }

    #[test]
    fn test_icr_truncation_order() {
        // The USD value truncates before the ratio divide. 3 attoFIL at a
        // price of 1.5 is worth 4 (4.5 truncated); against 2 attoFIL-units of
        // composite debt that is a ratio of 2.0, not the 2.25 a fused
        // multiply-divide would give.
        let price = DECIMAL_PRECISION + DECIMAL_PRECISION / 2;
        let icr = compute_icr(3, 2, price).unwrap();
        assert_eq!(icr, 2 * DECIMAL_PRECISION);
    }

    #[test]
    fn test_nominal_icr_uses_reference_price() {
        let coll = 30 * DECIMAL_PRECISION;
        let debt = 1_500 * DECIMAL_PRECISION;
        assert_eq!(
            compute_nominal_icr(coll, debt).unwrap(),
            compute_icr(coll, debt, NOMINAL_PRICE).unwrap()
        );
        // 30 FIL * $100 / 1500 = 200%
        assert_eq!(compute_nominal_icr(coll, debt).unwrap(), 2 * DECIMAL_PRECISION);
    }
}
