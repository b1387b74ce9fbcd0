//! The Trove ledger: Trove records, stakes, and the two aggregate pools.
//!
//! The ActivePool backs the applied debt and collateral of open Troves; the
//! DefaultPool holds amounts redistributed by liquidations that Troves have
//! not yet absorbed. Redistribution is tracked lazily through two
//! reward-per-unit-staked accumulators (`l_coll`, `l_debt`); a Trove's unpaid
//! share is the growth of those accumulators since its last snapshot, scaled
//! by its stake. `apply_pending_rewards` must run before any read that feeds
//! a liquidation decision; it is idempotent.
//!
//! Truncation dust from the per-unit division is carried into the next
//! redistribution by the error-feedback terms, so nothing is lost and the
//! accumulators never drift ahead of the DefaultPool balance.

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::core::trove::{RewardSnapshot, Trove, TroveStatus};
use crate::error::{Error, Result};
use crate::liquidation::compensation::composite_debt;
use crate::utils::address::Address;
use crate::utils::constants::DECIMAL_PRECISION;
use crate::utils::math::{compute_icr, compute_nominal_icr, mul_div, safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// POOLS
// ═══════════════════════════════════════════════════════════════════════════════

/// A running collateral/debt total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Collateral in attoFIL
    pub collateral: u128,
    /// fUSD debt, 18 decimals
    pub debt: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTIRE POSITION
// ═══════════════════════════════════════════════════════════════════════════════

/// A Trove's debt and collateral with pending redistribution rewards folded in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntirePosition {
    /// Applied debt plus pending debt reward
    pub debt: u128,
    /// Applied collateral plus pending collateral reward
    pub collateral: u128,
    /// Unapplied debt reward
    pub pending_debt: u128,
    /// Unapplied collateral reward
    pub pending_collateral: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot of the ledger's aggregate state
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LedgerStatistics {
    /// Number of active Troves
    pub active_troves: u64,
    /// ActivePool totals
    pub active_pool: Pool,
    /// DefaultPool totals
    pub default_pool: Pool,
    /// Sum of all active stakes
    pub total_stakes: u128,
    /// Collateral reward-per-unit-staked accumulator
    pub l_coll: u128,
    /// Debt reward-per-unit-staked accumulator
    pub l_debt: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TROVE LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// The data store of Troves and the aggregate pools they move value between
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TroveLedger {
    troves: BTreeMap<Address, Trove>,
    active_pool: Pool,
    default_pool: Pool,
    active_count: u64,
    total_stakes: u128,
    /// Total stakes at the last system snapshot (taken after each liquidation)
    total_stakes_snapshot: u128,
    /// Total collateral at the last system snapshot, excluding the
    /// gas-compensation remainder of that liquidation
    total_collateral_snapshot: u128,
    /// Redistributed collateral per unit staked, 18 decimals
    l_coll: u128,
    /// Redistributed debt per unit staked, 18 decimals
    l_debt: u128,
    last_coll_error_redistribution: u128,
    last_debt_error_redistribution: u128,
}

impl TroveLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Look up a Trove record (active or closed)
    pub fn trove(&self, owner: &Address) -> Option<&Trove> {
        self.troves.get(owner)
    }

    /// Whether any record exists for this owner, active or not
    pub fn contains(&self, owner: &Address) -> bool {
        self.troves.contains_key(owner)
    }

    /// Number of active Troves
    pub fn active_trove_count(&self) -> u64 {
        self.active_count
    }

    /// ActivePool totals
    pub fn active_pool(&self) -> Pool {
        self.active_pool
    }

    /// DefaultPool totals
    pub fn default_pool(&self) -> Pool {
        self.default_pool
    }

    /// DefaultPool debt (redistribution interface)
    pub fn default_debt(&self) -> u128 {
        self.default_pool.debt
    }

    /// DefaultPool collateral (redistribution interface)
    pub fn default_collateral(&self) -> u128 {
        self.default_pool.collateral
    }

    /// Sum of all active stakes
    pub fn total_stakes(&self) -> u128 {
        self.total_stakes
    }

    /// Collateral reward-per-unit-staked accumulator
    pub fn l_coll(&self) -> u128 {
        self.l_coll
    }

    /// Debt reward-per-unit-staked accumulator
    pub fn l_debt(&self) -> u128 {
        self.l_debt
    }

    /// Total system debt across both pools
    pub fn entire_system_debt(&self) -> u128 {
        self.active_pool.debt.saturating_add(self.default_pool.debt)
    }

    /// Total system collateral across both pools
    pub fn entire_system_collateral(&self) -> u128 {
        self.active_pool
            .collateral
            .saturating_add(self.default_pool.collateral)
    }

    /// Aggregate statistics
    pub fn statistics(&self) -> LedgerStatistics {
        LedgerStatistics {
            active_troves: self.active_count,
            active_pool: self.active_pool,
            default_pool: self.default_pool,
            total_stakes: self.total_stakes,
            l_coll: self.l_coll,
            l_debt: self.l_debt,
        }
    }

    fn require_active(&self, owner: &Address) -> Result<&Trove> {
        match self.troves.get(owner) {
            None => Err(Error::TroveNotFound(owner.to_string())),
            Some(trove) if !trove.is_active() => Err(Error::TroveNotActive(owner.to_string())),
            Some(trove) => Ok(trove),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PENDING REWARDS
    // ═══════════════════════════════════════════════════════════════════════════

    fn trove_has_pending(trove: &Trove, l_coll: u128, l_debt: u128) -> bool {
        trove.is_active()
            && (trove.reward_snapshot.coll < l_coll || trove.reward_snapshot.debt < l_debt)
    }

    /// Whether the Trove has redistribution rewards it has not absorbed yet
    pub fn has_pending_rewards(&self, owner: &Address) -> bool {
        self.troves
            .get(owner)
            .map(|t| Self::trove_has_pending(t, self.l_coll, self.l_debt))
            .unwrap_or(false)
    }

    fn pending_reward(stake: u128, accumulator: u128, snapshot: u128) -> Result<u128> {
        let growth = safe_sub(accumulator, snapshot)?;
        mul_div(stake, growth, DECIMAL_PRECISION)
    }

    /// The Trove's debt and collateral with pending rewards folded in.
    /// Read-only; the Trove and pools are untouched.
    pub fn entire_position(&self, owner: &Address) -> Result<EntirePosition> {
        let trove = self.require_active(owner)?;
        let pending_collateral =
            Self::pending_reward(trove.stake, self.l_coll, trove.reward_snapshot.coll)?;
        let pending_debt =
            Self::pending_reward(trove.stake, self.l_debt, trove.reward_snapshot.debt)?;
        Ok(EntirePosition {
            debt: safe_add(trove.debt, pending_debt)?,
            collateral: safe_add(trove.collateral, pending_collateral)?,
            pending_debt,
            pending_collateral,
        })
    }

    /// Fold the Trove's pending redistribution rewards into its applied debt
    /// and collateral, moving the amounts DefaultPool -> ActivePool, and
    /// refresh its snapshot. Idempotent: a second call is a no-op.
    ///
    /// Precondition for every read used in a liquidation decision.
    pub fn apply_pending_rewards(&mut self, owner: &Address) -> Result<()> {
        let (pending_collateral, pending_debt) = {
            let trove = self.require_active(owner)?;
            if !Self::trove_has_pending(trove, self.l_coll, self.l_debt) {
                return Ok(());
            }
            (
                Self::pending_reward(trove.stake, self.l_coll, trove.reward_snapshot.coll)?,
                Self::pending_reward(trove.stake, self.l_debt, trove.reward_snapshot.debt)?,
            )
        };

        let snapshot = RewardSnapshot {
            coll: self.l_coll,
            debt: self.l_debt,
        };
        {
            // require_active above guarantees the entry exists
            let trove = self
                .troves
                .get_mut(owner)
                .ok_or_else(|| Error::TroveNotFound(owner.to_string()))?;
            trove.collateral = safe_add(trove.collateral, pending_collateral)?;
            trove.debt = safe_add(trove.debt, pending_debt)?;
            trove.reward_snapshot = snapshot;
        }

        self.default_pool.collateral = safe_sub(self.default_pool.collateral, pending_collateral)?;
        self.default_pool.debt = safe_sub(self.default_pool.debt, pending_debt)?;
        self.active_pool.collateral = safe_add(self.active_pool.collateral, pending_collateral)?;
        self.active_pool.debt = safe_add(self.active_pool.debt, pending_debt)?;

        tracing::debug!(
            owner = %owner,
            pending_collateral,
            pending_debt,
            "applied pending redistribution rewards"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLATERAL RATIOS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The Trove's ICR at the given price, over its entire position (pending
    /// rewards included)
    pub fn current_icr(&self, owner: &Address, price: u128, gas_compensation: u128) -> Result<u128> {
        let entire = self.entire_position(owner)?;
        compute_icr(
            entire.collateral,
            composite_debt(entire.debt, gas_compensation)?,
            price,
        )
    }

    /// The Trove's nominal ICR (at the fixed reference price), the registry
    /// ordering key
    pub fn nominal_icr(&self, owner: &Address, gas_compensation: u128) -> Result<u128> {
        let entire = self.entire_position(owner)?;
        compute_nominal_icr(
            entire.collateral,
            composite_debt(entire.debt, gas_compensation)?,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a new active Trove and back it with the ActivePool.
    /// The snapshot starts at the current accumulators so the Trove inherits
    /// no pending rewards; the stake is set from the system snapshot ratio.
    pub fn open_trove(&mut self, owner: Address, collateral: u128, debt: u128) -> Result<()> {
        if self.troves.get(&owner).map(Trove::is_active).unwrap_or(false) {
            return Err(Error::TroveAlreadyExists(owner.to_string()));
        }

        let mut trove = Trove::new(owner, collateral, debt);
        trove.reward_snapshot = RewardSnapshot {
            coll: self.l_coll,
            debt: self.l_debt,
        };
        self.troves.insert(owner, trove);
        self.active_count += 1;
        self.update_stake_and_total_stakes(&owner)?;

        self.active_pool.collateral = safe_add(self.active_pool.collateral, collateral)?;
        self.active_pool.debt = safe_add(self.active_pool.debt, debt)?;

        tracing::debug!(owner = %owner, collateral, debt, "trove opened");
        Ok(())
    }

    /// Close a Trove: set the terminal status, zero its live fields, and drop
    /// it from the active count. The stake must already have been removed and
    /// the caller settles the pool side and the registry entry within the
    /// same engine call.
    pub fn close_trove(&mut self, owner: &Address, status: TroveStatus) -> Result<()> {
        debug_assert!(status.is_closed());
        self.require_active(owner)?;
        if self.active_count <= 1 {
            return Err(Error::LastTroveProtected);
        }

        let trove = self
            .troves
            .get_mut(owner)
            .ok_or_else(|| Error::TroveNotFound(owner.to_string()))?;
        trove.status = status;
        trove.debt = 0;
        trove.collateral = 0;
        trove.reward_snapshot = RewardSnapshot::default();
        self.active_count -= 1;

        tracing::debug!(owner = %owner, ?status, "trove closed");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STAKES
    // ═══════════════════════════════════════════════════════════════════════════

    fn compute_new_stake(&self, collateral: u128) -> Result<u128> {
        if self.total_collateral_snapshot == 0 {
            Ok(collateral)
        } else {
            mul_div(
                collateral,
                self.total_stakes_snapshot,
                self.total_collateral_snapshot,
            )
        }
    }

    /// Recompute the Trove's stake from the snapshot ratio. Must run after
    /// every collateral change.
    pub fn update_stake_and_total_stakes(&mut self, owner: &Address) -> Result<u128> {
        let (old_stake, new_stake) = {
            let trove = self.require_active(owner)?;
            (trove.stake, self.compute_new_stake(trove.collateral)?)
        };
        self.total_stakes = safe_add(safe_sub(self.total_stakes, old_stake)?, new_stake)?;
        if let Some(trove) = self.troves.get_mut(owner) {
            trove.stake = new_stake;
        }
        Ok(new_stake)
    }

    /// Remove the Trove's stake from the total ahead of closing it
    pub fn remove_stake(&mut self, owner: &Address) -> Result<()> {
        let stake = self.require_active(owner)?.stake;
        self.total_stakes = safe_sub(self.total_stakes, stake)?;
        if let Some(trove) = self.troves.get_mut(owner) {
            trove.stake = 0;
        }
        Ok(())
    }

    /// Refresh the system snapshots after a liquidation. The collateral
    /// snapshot excludes the gas-compensation remainder about to leave the
    /// ActivePool but includes everything redistributed to the DefaultPool.
    pub fn update_system_snapshots(&mut self, coll_remainder: u128) -> Result<()> {
        self.total_stakes_snapshot = self.total_stakes;
        let active_less_remainder = safe_sub(self.active_pool.collateral, coll_remainder)?;
        self.total_collateral_snapshot =
            safe_add(active_less_remainder, self.default_pool.collateral)?;
        tracing::debug!(
            total_stakes_snapshot = self.total_stakes_snapshot,
            total_collateral_snapshot = self.total_collateral_snapshot,
            "system snapshots updated"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REDISTRIBUTION
    // ═══════════════════════════════════════════════════════════════════════════

    fn per_unit_with_feedback(amount: u128, error: u128, total_stakes: u128) -> Result<(u128, u128)> {
        // numerator = amount * 1e18 + error, computed wide; the remainder of
        // the division is the new error term and always fits u128
        let numerator =
            U256::from(amount) * U256::from(DECIMAL_PRECISION) + U256::from(error);
        let per_unit = numerator / U256::from(total_stakes);
        let new_error = numerator - per_unit * U256::from(total_stakes);
        if per_unit.bits() > 128 {
            return Err(Error::Overflow {
                operation: format!("redistribution per-unit for amount {}", amount),
            });
        }
        Ok((per_unit.as_u128(), new_error.as_u128()))
    }

    /// Spread debt and collateral that could not be offset across all
    /// remaining active Troves by advancing the accumulators, and move the
    /// amounts ActivePool -> DefaultPool.
    pub fn redistribute(&mut self, debt: u128, collateral: u128) -> Result<()> {
        if debt == 0 && collateral == 0 {
            return Ok(());
        }
        if self.total_stakes == 0 {
            return Err(Error::NoStakesToRedistributeAgainst);
        }

        let (coll_per_unit, coll_error) = Self::per_unit_with_feedback(
            collateral,
            self.last_coll_error_redistribution,
            self.total_stakes,
        )?;
        let (debt_per_unit, debt_error) = Self::per_unit_with_feedback(
            debt,
            self.last_debt_error_redistribution,
            self.total_stakes,
        )?;

        self.l_coll = safe_add(self.l_coll, coll_per_unit)?;
        self.l_debt = safe_add(self.l_debt, debt_per_unit)?;
        self.last_coll_error_redistribution = coll_error;
        self.last_debt_error_redistribution = debt_error;

        self.active_pool.collateral = safe_sub(self.active_pool.collateral, collateral)?;
        self.active_pool.debt = safe_sub(self.active_pool.debt, debt)?;
        self.default_pool.collateral = safe_add(self.default_pool.collateral, collateral)?;
        self.default_pool.debt = safe_add(self.default_pool.debt, debt)?;

        tracing::debug!(debt, collateral, coll_per_unit, debt_per_unit, "redistributed");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // POOL MOVEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Debit the ActivePool for amounts leaving the system boundary (offset
    /// into the stability pool, or an owner close settling externally)
    pub fn debit_active_pool(&mut self, debt: u128, collateral: u128) -> Result<()> {
        self.active_pool.debt = safe_sub(self.active_pool.debt, debt)?;
        self.active_pool.collateral = safe_sub(self.active_pool.collateral, collateral)?;
        Ok(())
    }

    /// Pay collateral out of the ActivePool (gas compensation transfer)
    pub fn send_collateral_from_active(&mut self, amount: u128) -> Result<()> {
        self.active_pool.collateral = safe_sub(self.active_pool.collateral, amount)?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADJUSTMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add collateral to an active Trove, mirrored in the ActivePool
    pub fn increase_trove_collateral(&mut self, owner: &Address, amount: u128) -> Result<u128> {
        self.require_active(owner)?;
        let trove = self
            .troves
            .get_mut(owner)
            .ok_or_else(|| Error::TroveNotFound(owner.to_string()))?;
        trove.collateral = safe_add(trove.collateral, amount)?;
        let new_collateral = trove.collateral;
        self.active_pool.collateral = safe_add(self.active_pool.collateral, amount)?;
        Ok(new_collateral)
    }

    /// Remove collateral from an active Trove, mirrored in the ActivePool
    pub fn decrease_trove_collateral(&mut self, owner: &Address, amount: u128) -> Result<u128> {
        let available = self.require_active(owner)?.collateral;
        if amount > available {
            return Err(Error::InsufficientCollateral {
                requested: amount,
                available,
            });
        }
        let trove = self
            .troves
            .get_mut(owner)
            .ok_or_else(|| Error::TroveNotFound(owner.to_string()))?;
        trove.collateral -= amount;
        let new_collateral = trove.collateral;
        self.active_pool.collateral = safe_sub(self.active_pool.collateral, amount)?;
        Ok(new_collateral)
    }

    /// Add debt to an active Trove, mirrored in the ActivePool
    pub fn increase_trove_debt(&mut self, owner: &Address, amount: u128) -> Result<u128> {
        self.require_active(owner)?;
        let trove = self
            .troves
            .get_mut(owner)
            .ok_or_else(|| Error::TroveNotFound(owner.to_string()))?;
        trove.debt = safe_add(trove.debt, amount)?;
        let new_debt = trove.debt;
        self.active_pool.debt = safe_add(self.active_pool.debt, amount)?;
        Ok(new_debt)
    }

    /// Repay debt of an active Trove, mirrored in the ActivePool
    pub fn decrease_trove_debt(&mut self, owner: &Address, amount: u128) -> Result<u128> {
        let debt = self.require_active(owner)?.debt;
        if amount > debt {
            return Err(Error::RepaymentExceedsDebt { amount, debt });
        }
        let trove = self
            .troves
            .get_mut(owner)
            .ok_or_else(|| Error::TroveNotFound(owner.to_string()))?;
        trove.debt -= amount;
        let new_debt = trove.debt;
        self.active_pool.debt = safe_sub(self.active_pool.debt, amount)?;
        Ok(new_debt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::DEFAULT_GAS_COMPENSATION;

    const FIL: u128 = DECIMAL_PRECISION;

    fn ledger_with(troves: &[(Address, u128, u128)]) -> TroveLedger {
        let mut ledger = TroveLedger::new();
        for (owner, coll, debt) in troves {
            ledger.open_trove(*owner, *coll, *debt).unwrap();
        }
        ledger
    }

    #[test]
    fn test_open_trove_backs_active_pool() {
        let a = Address::random();
        let ledger = ledger_with(&[(a, 10 * FIL, 2_000 * FIL)]);
        assert_eq!(ledger.active_pool().collateral, 10 * FIL);
        assert_eq!(ledger.active_pool().debt, 2_000 * FIL);
        assert_eq!(ledger.active_trove_count(), 1);
        // first stake equals collateral (no snapshot yet)
        assert_eq!(ledger.trove(&a).unwrap().stake, 10 * FIL);
        assert_eq!(ledger.total_stakes(), 10 * FIL);
    }

    #[test]
    fn test_open_twice_rejected_reopen_after_close_allowed() {
        let a = Address::random();
        let b = Address::random();
        let mut ledger = ledger_with(&[(a, 10 * FIL, 2_000 * FIL), (b, 10 * FIL, 2_000 * FIL)]);
        assert!(matches!(
            ledger.open_trove(a, FIL, FIL),
            Err(Error::TroveAlreadyExists(_))
        ));

        ledger.remove_stake(&a).unwrap();
        ledger.close_trove(&a, TroveStatus::ClosedByOwner).unwrap();
        ledger.debit_active_pool(2_000 * FIL, 10 * FIL).unwrap();
        assert_eq!(
            ledger.trove(&a).unwrap().status,
            TroveStatus::ClosedByOwner
        );

        // the record survives the close and the owner can open again
        assert!(ledger.contains(&a));
        ledger.open_trove(a, 5 * FIL, 1_900 * FIL).unwrap();
        assert!(ledger.trove(&a).unwrap().is_active());
    }

    #[test]
    fn test_close_last_trove_rejected() {
        let a = Address::random();
        let mut ledger = ledger_with(&[(a, 10 * FIL, 2_000 * FIL)]);
        ledger.remove_stake(&a).unwrap();
        assert_eq!(
            ledger.close_trove(&a, TroveStatus::ClosedByOwner),
            Err(Error::LastTroveProtected)
        );
    }

    #[test]
    fn test_redistribution_accrues_pending_rewards() {
        let a = Address::random();
        let b = Address::random();
        // equal stakes: rewards split evenly
        let mut ledger = ledger_with(&[(a, 10 * FIL, 2_000 * FIL), (b, 10 * FIL, 2_000 * FIL)]);

        ledger.redistribute(100 * FIL, 2 * FIL).unwrap();
        assert_eq!(ledger.default_pool().debt, 100 * FIL);
        assert_eq!(ledger.default_pool().collateral, 2 * FIL);

        let entire = ledger.entire_position(&a).unwrap();
        assert_eq!(entire.pending_debt, 50 * FIL);
        assert_eq!(entire.pending_collateral, FIL);
        assert_eq!(entire.debt, 2_050 * FIL);
        assert_eq!(entire.collateral, 11 * FIL);
    }

    #[test]
    fn test_apply_pending_rewards_is_idempotent() {
        let a = Address::random();
        let b = Address::random();
        let mut ledger = ledger_with(&[(a, 10 * FIL, 2_000 * FIL), (b, 30 * FIL, 2_000 * FIL)]);
        ledger.redistribute(400 * FIL, 4 * FIL).unwrap();

        assert!(ledger.has_pending_rewards(&a));
        ledger.apply_pending_rewards(&a).unwrap();
        assert!(!ledger.has_pending_rewards(&a));

        let trove = ledger.trove(&a).unwrap().clone();
        // a holds 1/4 of the stakes
        assert_eq!(trove.debt, 2_100 * FIL);
        assert_eq!(trove.collateral, 11 * FIL);

        // second application changes nothing
        ledger.apply_pending_rewards(&a).unwrap();
        assert_eq!(ledger.trove(&a).unwrap(), &trove);

        // pools moved exactly the applied share
        assert_eq!(ledger.default_pool().debt, 300 * FIL);
        assert_eq!(ledger.default_pool().collateral, 3 * FIL);
    }

    #[test]
    fn test_redistribution_error_feedback_carries_dust() {
        let a = Address::from_slice(&[1u8; 20]).unwrap();
        let b = Address::from_slice(&[2u8; 20]).unwrap();
        let c = Address::from_slice(&[3u8; 20]).unwrap();
        // three equal stakes, indivisible amount
        let mut ledger = ledger_with(&[
            (a, FIL, 2_000 * FIL),
            (b, FIL, 2_000 * FIL),
            (c, FIL, 2_000 * FIL),
        ]);

        // per-unit truncates; the remainder is carried, not lost
        ledger.redistribute(0, 100).unwrap();
        assert_eq!(ledger.l_coll(), 33);
        ledger.redistribute(0, 100).unwrap();
        assert_eq!(ledger.l_coll(), 66);
        // two units of dust carried so far; the third round absorbs them:
        // (100e18 + 2e18) / 3e18 = 34
        ledger.redistribute(0, 100).unwrap();
        assert_eq!(ledger.l_coll(), 100);

        // each trove's pending share now sums to exactly the 300 put in
        let pending: u128 = [&a, &b, &c]
            .iter()
            .map(|o| ledger.entire_position(o).unwrap().pending_collateral)
            .sum();
        assert_eq!(pending, 300);
    }

    #[test]
    fn test_redistribute_with_no_stakes_fails() {
        let mut ledger = TroveLedger::new();
        assert_eq!(
            ledger.redistribute(FIL, FIL),
            Err(Error::NoStakesToRedistributeAgainst)
        );
    }

    #[test]
    fn test_stake_snapshot_ratio_after_liquidation_style_update() {
        let a = Address::random();
        let b = Address::random();
        let mut ledger = ledger_with(&[(a, 10 * FIL, 2_000 * FIL), (b, 10 * FIL, 2_000 * FIL)]);

        // simulate a liquidation having redistributed b's collateral
        ledger.remove_stake(&b).unwrap();
        ledger.close_trove(&b, TroveStatus::ClosedByLiquidation).unwrap();
        ledger.redistribute(2_000 * FIL, 10 * FIL).unwrap();
        ledger.update_system_snapshots(0).unwrap();

        assert_eq!(ledger.total_stakes(), 10 * FIL);
        // active 10 + default 10
        assert_eq!(ledger.entire_system_collateral(), 20 * FIL);

        // a newcomer with 20 FIL gets a stake scaled by stakes/collateral at
        // the snapshot: 20 * 10 / 20 = 10
        let c = Address::random();
        ledger.open_trove(c, 20 * FIL, 2_000 * FIL).unwrap();
        assert_eq!(ledger.trove(&c).unwrap().stake, 10 * FIL);
    }

    #[test]
    fn test_current_icr_includes_pending_rewards() {
        let a = Address::random();
        let b = Address::random();
        let mut ledger = ledger_with(&[(a, 10 * FIL, 1_800 * FIL), (b, 10 * FIL, 1_800 * FIL)]);
        let price = 400 * FIL;

        let icr_before = ledger
            .current_icr(&a, price, DEFAULT_GAS_COMPENSATION)
            .unwrap();
        ledger.redistribute(1_000 * FIL, 0).unwrap();
        let icr_after = ledger
            .current_icr(&a, price, DEFAULT_GAS_COMPENSATION)
            .unwrap();
        assert!(icr_after < icr_before);
    }

    #[test]
    fn test_adjustments_mirror_active_pool() {
        let a = Address::random();
        let b = Address::random();
        let mut ledger = ledger_with(&[(a, 10 * FIL, 2_000 * FIL), (b, 10 * FIL, 2_000 * FIL)]);

        ledger.increase_trove_collateral(&a, 5 * FIL).unwrap();
        ledger.increase_trove_debt(&a, 100 * FIL).unwrap();
        ledger.decrease_trove_debt(&a, 50 * FIL).unwrap();
        ledger.decrease_trove_collateral(&a, FIL).unwrap();

        assert_eq!(ledger.trove(&a).unwrap().collateral, 14 * FIL);
        assert_eq!(ledger.trove(&a).unwrap().debt, 2_050 * FIL);
        assert_eq!(ledger.active_pool().collateral, 24 * FIL);
        assert_eq!(ledger.active_pool().debt, 4_050 * FIL);

        assert!(matches!(
            ledger.decrease_trove_collateral(&a, 100 * FIL),
            Err(Error::InsufficientCollateral { .. })
        ));
        assert!(matches!(
            ledger.decrease_trove_debt(&a, u128::MAX),
            Err(Error::RepaymentExceedsDebt { .. })
        ));
    }
}
