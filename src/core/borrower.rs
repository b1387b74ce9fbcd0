//! Borrower-facing Trove operations.
//!
//! Opening, adjusting, and closing a Trove all validate against the same
//! math the liquidation engine applies: composite debt includes the virtual
//! gas compensation, ICR checks run over the entire position with pending
//! rewards folded in, and every collateral or debt change re-inserts the
//! Trove into the registry under its new nominal ICR.
//!
//! Like the engine, each operation mutates a clone of the system state and
//! commits it whole, so a rejected adjustment leaves nothing behind, not
//! even the pending-reward application that preceded the check.
//!
//! Token movement at the system boundary (the owner funding collateral,
//! receiving borrowed fUSD, or settling debt on close) happens outside this
//! crate; these operations keep the internal accounting consistent with it.

use crate::core::trove::TroveStatus;
use crate::error::{Error, Result};
use crate::liquidation::compensation::composite_debt;
use crate::oracle::price_feed::PriceOracle;
use crate::system::SystemState;
use crate::utils::address::Address;
use crate::utils::math::{compute_icr, compute_nominal_icr};

// ═══════════════════════════════════════════════════════════════════════════════
// OPEN
// ═══════════════════════════════════════════════════════════════════════════════

/// Open a new Trove with the given collateral and net debt.
///
/// Rejects a debt below the protocol minimum, an ICR below the minimum
/// collateral ratio at the current price, and an owner with an already
/// active Trove.
pub fn open_trove(
    state: &mut SystemState,
    oracle: &dyn PriceOracle,
    owner: Address,
    collateral: u128,
    debt: u128,
    hint: Option<Address>,
) -> Result<()> {
    let price = oracle.price()?;
    let params = state.params;

    if debt < params.min_net_debt {
        return Err(Error::DebtBelowMinimum {
            amount: debt,
            minimum: params.min_net_debt,
        });
    }
    let composite = composite_debt(debt, params.gas_compensation)?;
    let icr = compute_icr(collateral, composite, price)?;
    if icr < params.mcr {
        return Err(Error::IcrBelowMcr {
            icr,
            mcr: params.mcr,
        });
    }

    let mut working = state.clone();
    working.ledger.open_trove(owner, collateral, debt)?;
    let nicr = compute_nominal_icr(collateral, composite)?;
    working.registry.insert(owner, nicr, hint)?;
    *state = working;

    tracing::info!(owner = %owner, collateral, debt, icr, "trove opened");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADJUSTMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Add collateral to an active Trove. Returns the new collateral amount.
pub fn add_collateral(
    state: &mut SystemState,
    owner: &Address,
    amount: u128,
    prev_hint: Option<Address>,
    next_hint: Option<Address>,
) -> Result<u128> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    let mut working = state.clone();
    working.ledger.apply_pending_rewards(owner)?;
    let new_collateral = working.ledger.increase_trove_collateral(owner, amount)?;
    reposition(&mut working, owner, prev_hint, next_hint)?;
    *state = working;

    tracing::debug!(owner = %owner, amount, new_collateral, "collateral added");
    Ok(new_collateral)
}

/// Withdraw collateral from an active Trove, as long as the ICR stays at or
/// above the minimum. Returns the new collateral amount.
pub fn withdraw_collateral(
    state: &mut SystemState,
    oracle: &dyn PriceOracle,
    owner: &Address,
    amount: u128,
    prev_hint: Option<Address>,
    next_hint: Option<Address>,
) -> Result<u128> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    let price = oracle.price()?;
    let mut working = state.clone();
    working.ledger.apply_pending_rewards(owner)?;
    let new_collateral = working.ledger.decrease_trove_collateral(owner, amount)?;
    require_icr_above_minimum(&working, owner, price)?;
    reposition(&mut working, owner, prev_hint, next_hint)?;
    *state = working;

    tracing::debug!(owner = %owner, amount, new_collateral, "collateral withdrawn");
    Ok(new_collateral)
}

/// Mint additional fUSD debt against an active Trove, as long as the ICR
/// stays at or above the minimum. Returns the new net debt.
pub fn borrow(
    state: &mut SystemState,
    oracle: &dyn PriceOracle,
    owner: &Address,
    amount: u128,
    prev_hint: Option<Address>,
    next_hint: Option<Address>,
) -> Result<u128> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    let price = oracle.price()?;
    let mut working = state.clone();
    working.ledger.apply_pending_rewards(owner)?;
    let new_debt = working.ledger.increase_trove_debt(owner, amount)?;
    require_icr_above_minimum(&working, owner, price)?;
    reposition(&mut working, owner, prev_hint, next_hint)?;
    *state = working;

    tracing::debug!(owner = %owner, amount, new_debt, "debt borrowed");
    Ok(new_debt)
}

/// Repay part of an active Trove's debt. The remaining net debt must stay
/// at or above the protocol minimum; full repayment goes through
/// [`close_trove`]. Returns the new net debt.
pub fn repay(
    state: &mut SystemState,
    owner: &Address,
    amount: u128,
    prev_hint: Option<Address>,
    next_hint: Option<Address>,
) -> Result<u128> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    let mut working = state.clone();
    working.ledger.apply_pending_rewards(owner)?;
    let new_debt = working.ledger.decrease_trove_debt(owner, amount)?;
    if new_debt < working.params.min_net_debt {
        return Err(Error::DebtBelowMinimum {
            amount: new_debt,
            minimum: working.params.min_net_debt,
        });
    }
    reposition(&mut working, owner, prev_hint, next_hint)?;
    *state = working;

    tracing::debug!(owner = %owner, amount, new_debt, "debt repaid");
    Ok(new_debt)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOSE
// ═══════════════════════════════════════════════════════════════════════════════

/// Close a Trove by owner request, releasing its collateral.
///
/// The last active Trove cannot be closed. Returns the collateral released
/// to the owner and the debt the owner settles externally.
pub fn close_trove(state: &mut SystemState, owner: &Address) -> Result<(u128, u128)> {
    let mut working = state.clone();
    working.ledger.apply_pending_rewards(owner)?;
    let (collateral, debt) = {
        let trove = working
            .ledger
            .trove(owner)
            .ok_or_else(|| Error::TroveNotFound(owner.to_string()))?;
        (trove.collateral, trove.debt)
    };

    working.ledger.remove_stake(owner)?;
    working.ledger.close_trove(owner, TroveStatus::ClosedByOwner)?;
    working.ledger.debit_active_pool(debt, collateral)?;
    working.registry.remove(owner)?;
    *state = working;

    tracing::info!(owner = %owner, collateral, debt, "trove closed by owner");
    Ok((collateral, debt))
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTERNAL
// ═══════════════════════════════════════════════════════════════════════════════

fn require_icr_above_minimum(working: &SystemState, owner: &Address, price: u128) -> Result<()> {
    let icr = working
        .ledger
        .current_icr(owner, price, working.params.gas_compensation)?;
    if icr < working.params.mcr {
        return Err(Error::IcrBelowMcr {
            icr,
            mcr: working.params.mcr,
        });
    }
    Ok(())
}

/// Refresh the Trove's stake and move it to the registry slot its new
/// nominal ICR sorts to
fn reposition(
    working: &mut SystemState,
    owner: &Address,
    prev_hint: Option<Address>,
    next_hint: Option<Address>,
) -> Result<()> {
    working.ledger.update_stake_and_total_stakes(owner)?;
    let nicr = working
        .ledger
        .nominal_icr(owner, working.params.gas_compensation)?;
    working.registry.re_insert(*owner, nicr, prev_hint, next_hint)
}
