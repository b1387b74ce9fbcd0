//! Gas compensation for liquidation callers.
//!
//! Every Trove carries a fixed virtual debt (`GAS_COMPENSATION`) that is
//! added when computing collateral ratios but never minted or repaid. On
//! liquidation the caller is paid a slice of the Trove's collateral: 0.5% of
//! it, or if that slice is worth less than 10 USD, the collateral amount
//! worth exactly 10 USD, capped at the Trove's full collateral. The rest is
//! what actually gets offset or redistributed.
//!
//! All divisions truncate toward zero. Callers compare these outputs across
//! runs, so the arithmetic must be reproducible to the wei.

use crate::error::Result;
use crate::utils::constants::{DECIMAL_PRECISION, MIN_COLL_GAS_COMP_VALUE, PERCENT_DIVISOR};
use crate::utils::math::{mul_div, safe_add, usd_value};

/// Debt with the virtual gas compensation added. Used for ICR math only,
/// never for minted-debt accounting.
pub fn composite_debt(debt: u128, gas_compensation: u128) -> Result<u128> {
    safe_add(debt, gas_compensation)
}

/// The collateral slice paid to the liquidation caller.
///
/// Returns 0.5% of the collateral when that slice is worth at least 10 USD
/// at `price`, otherwise the collateral amount worth exactly 10 USD, capped
/// at the full collateral. A zero price degenerates to the cap: the whole
/// collateral is compensation and nothing remains to liquidate.
pub fn coll_gas_compensation(collateral: u128, price: u128) -> Result<u128> {
    let pct = collateral / PERCENT_DIVISOR;
    if usd_value(pct, price)? >= MIN_COLL_GAS_COMP_VALUE {
        return Ok(pct);
    }
    if price == 0 {
        return Ok(collateral);
    }
    let floor_amount = mul_div(MIN_COLL_GAS_COMP_VALUE, DECIMAL_PRECISION, price)?;
    Ok(floor_amount.min(collateral))
}
