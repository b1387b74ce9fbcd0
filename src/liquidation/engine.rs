//! The liquidation engine.
//!
//! Liquidation closes a Trove whose ICR has fallen below the minimum
//! collateral ratio, carves a gas compensation out of its collateral for the
//! calling account, and settles the rest: debt and collateral are offset
//! against the stability pool as far as its deposits reach, and anything
//! left over is redistributed across the remaining active Troves.
//!
//! Every entry point works on a clone of the system state and swaps it back
//! only after the last step has succeeded. A failed call, including a batch
//! that faults halfway through, leaves the state exactly as it found it.
//!
//! A batch walks the registry from the riskiest end and stops at the first
//! Trove at or above the minimum ratio. The stability pool deposit total is
//! read once per call and drawn down candidate by candidate, so later
//! candidates in the same batch see the already-reduced pool.

use serde::{Deserialize, Serialize};

use crate::core::trove::TroveStatus;
use crate::error::{Error, Result};
use crate::liquidation::compensation::coll_gas_compensation;
use crate::oracle::price_feed::PriceOracle;
use crate::system::SystemState;
use crate::utils::address::Address;
use crate::utils::constants::MAX_LIQUIDATION_HISTORY;
use crate::utils::math::{mul_div, safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION EVENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Record of a single liquidated Trove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    /// Monotonic sequence number across the engine's lifetime
    pub sequence: u64,
    /// Owner of the liquidated Trove
    pub owner: Address,
    /// Account that triggered the liquidation and received the compensation
    pub caller: Address,
    /// Debt settled against the pools
    pub debt_liquidated: u128,
    /// Collateral settled against the pools (compensation excluded)
    pub collateral_liquidated: u128,
    /// Collateral paid to the caller
    pub gas_compensation: u128,
    /// Portion of the debt absorbed by the stability pool
    pub debt_offset: u128,
    /// Portion of the debt redistributed to active Troves
    pub debt_redistributed: u128,
    /// Price the liquidation was evaluated at
    pub price: u128,
    /// The Trove's ICR at that price
    pub icr: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION TOTALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Aggregate outcome of one liquidation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationTotals {
    /// Number of Troves closed
    pub troves_liquidated: u64,
    /// Debt settled against the pools
    pub total_debt_liquidated: u128,
    /// Collateral settled against the pools (compensation excluded)
    pub total_collateral_liquidated: u128,
    /// Collateral paid to the caller
    pub total_gas_compensation: u128,
    /// Debt absorbed by the stability pool
    pub total_debt_offset: u128,
    /// Collateral sent to the stability pool
    pub total_collateral_offset: u128,
    /// Debt redistributed to active Troves
    pub total_debt_redistributed: u128,
    /// Collateral redistributed to active Troves
    pub total_collateral_redistributed: u128,
}

impl LiquidationTotals {
    fn accumulate(&mut self, values: &LiquidationValues) -> Result<()> {
        self.troves_liquidated += 1;
        self.total_debt_liquidated = safe_add(self.total_debt_liquidated, values.entire_debt)?;
        self.total_collateral_liquidated = safe_add(
            self.total_collateral_liquidated,
            values.collateral_liquidated,
        )?;
        self.total_gas_compensation =
            safe_add(self.total_gas_compensation, values.gas_compensation)?;
        self.total_debt_offset = safe_add(self.total_debt_offset, values.debt_to_offset)?;
        self.total_collateral_offset =
            safe_add(self.total_collateral_offset, values.coll_to_offset)?;
        self.total_debt_redistributed =
            safe_add(self.total_debt_redistributed, values.debt_to_redistribute)?;
        self.total_collateral_redistributed = safe_add(
            self.total_collateral_redistributed,
            values.coll_to_redistribute,
        )?;
        Ok(())
    }
}

/// Per-candidate settlement breakdown
#[derive(Debug, Clone, Copy)]
struct LiquidationValues {
    owner: Address,
    entire_debt: u128,
    entire_collateral: u128,
    gas_compensation: u128,
    /// `entire_collateral` less the compensation, split across the pools
    collateral_liquidated: u128,
    debt_to_offset: u128,
    coll_to_offset: u128,
    debt_to_redistribute: u128,
    coll_to_redistribute: u128,
    icr: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine closing undercollateralized Troves against the pools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEngine {
    /// Event history, oldest first
    events: Vec<LiquidationEvent>,
    /// Maximum events to keep
    max_events: usize,
    /// Next event sequence number source
    sequence: u64,
    /// Calls that committed at least one liquidation
    total_calls: u64,
    /// Troves closed over the engine's lifetime
    total_troves_liquidated: u64,
    /// Debt settled over the engine's lifetime
    total_debt_liquidated: u128,
    /// Collateral settled over the engine's lifetime
    total_collateral_liquidated: u128,
    /// Compensation paid over the engine's lifetime
    total_gas_compensation_paid: u128,
    /// Debt absorbed by the stability pool
    total_debt_offset: u128,
    /// Debt redistributed to active Troves
    total_debt_redistributed: u128,
}

impl Default for LiquidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LiquidationEngine {
    /// Create a new liquidation engine
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            max_events: MAX_LIQUIDATION_HISTORY,
            sequence: 0,
            total_calls: 0,
            total_troves_liquidated: 0,
            total_debt_liquidated: 0,
            total_collateral_liquidated: 0,
            total_gas_compensation_paid: 0,
            total_debt_offset: 0,
            total_debt_redistributed: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ENTRY POINTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Liquidate a single named Trove.
    ///
    /// Naming a nonexistent or closed Trove is an explicit failure. A target
    /// at or above the minimum collateral ratio is not a fault: the call
    /// returns zero totals and mutates nothing. Liquidating the last active
    /// Trove is rejected.
    pub fn liquidate(
        &mut self,
        state: &mut SystemState,
        oracle: &dyn PriceOracle,
        target: &Address,
        caller: Address,
    ) -> Result<LiquidationTotals> {
        let price = oracle.price()?;

        let icr = match state.ledger.trove(target) {
            None => return Err(Error::TroveNotFound(target.to_string())),
            Some(trove) if !trove.is_active() => {
                return Err(Error::TroveNotActive(target.to_string()))
            }
            Some(_) => state
                .ledger
                .current_icr(target, price, state.params.gas_compensation)?,
        };
        if icr >= state.params.mcr {
            tracing::debug!(
                target = %target,
                icr,
                mcr = state.params.mcr,
                "target at or above minimum collateral ratio, nothing to liquidate"
            );
            return Ok(LiquidationTotals::default());
        }

        let mut working = state.clone();
        let sp_deposits = working.stability_pool.total_debt_token_deposits();
        let values = Self::liquidate_candidate(&mut working, price, target, sp_deposits, icr)?;

        let mut totals = LiquidationTotals::default();
        totals.accumulate(&values)?;
        Self::settle(&mut working, &totals)?;
        *state = working;

        self.record(caller, price, &[values], &totals);
        Ok(totals)
    }

    /// Liquidate up to `max_troves` Troves, walking the registry from the
    /// riskiest end and stopping at the first Trove found at or above the
    /// minimum collateral ratio.
    ///
    /// The whole batch commits or fails as one: an error on any candidate,
    /// including last-trove protection, rolls back every earlier candidate
    /// in the same call.
    pub fn liquidate_troves(
        &mut self,
        state: &mut SystemState,
        oracle: &dyn PriceOracle,
        max_troves: usize,
        caller: Address,
    ) -> Result<LiquidationTotals> {
        if max_troves == 0 {
            return Ok(LiquidationTotals::default());
        }
        let price = oracle.price()?;

        let mut working = state.clone();
        let mcr = working.params.mcr;
        let gas_compensation = working.params.gas_compensation;
        let mut remaining_sp = working.stability_pool.total_debt_token_deposits();

        let mut liquidated = Vec::new();
        let mut totals = LiquidationTotals::default();
        let mut cursor = working.registry.last();

        while let Some(owner) = cursor {
            if liquidated.len() >= max_troves {
                break;
            }
            // the walk invalidates the current node, so step before removing
            let toward_head = working.registry.prev(&owner);

            let icr = working.ledger.current_icr(&owner, price, gas_compensation)?;
            if icr >= mcr {
                break;
            }

            let values = Self::liquidate_candidate(&mut working, price, &owner, remaining_sp, icr)?;
            remaining_sp = safe_sub(remaining_sp, values.debt_to_offset)?;
            totals.accumulate(&values)?;
            liquidated.push(values);
            cursor = toward_head;
        }

        if liquidated.is_empty() {
            tracing::debug!(max_troves, "no liquidatable troves found");
            return Ok(LiquidationTotals::default());
        }

        Self::settle(&mut working, &totals)?;
        *state = working;

        self.record(caller, price, &liquidated, &totals);
        Ok(totals)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CANDIDATE PROCESSING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Close one eligible Trove on the working state and compute its
    /// settlement split. Pool movements are deferred to [`Self::settle`];
    /// within a batch no candidate sees another's redistribution.
    fn liquidate_candidate(
        working: &mut SystemState,
        price: u128,
        owner: &Address,
        remaining_sp_deposits: u128,
        icr: u128,
    ) -> Result<LiquidationValues> {
        working.ledger.apply_pending_rewards(owner)?;
        let (entire_debt, entire_collateral) = {
            let trove = working
                .ledger
                .trove(owner)
                .ok_or_else(|| Error::TroveNotFound(owner.to_string()))?;
            (trove.debt, trove.collateral)
        };

        let gas_compensation = coll_gas_compensation(entire_collateral, price)?;
        let collateral_liquidated = safe_sub(entire_collateral, gas_compensation)?;

        // offset as much debt as the pool holds, with the proportional share
        // of the collateral; the rest is redistributed
        let (debt_to_offset, coll_to_offset) = if remaining_sp_deposits == 0 || entire_debt == 0 {
            (0, 0)
        } else {
            let debt_to_offset = entire_debt.min(remaining_sp_deposits);
            let coll_to_offset = mul_div(collateral_liquidated, debt_to_offset, entire_debt)?;
            (debt_to_offset, coll_to_offset)
        };
        let debt_to_redistribute = safe_sub(entire_debt, debt_to_offset)?;
        let coll_to_redistribute = safe_sub(collateral_liquidated, coll_to_offset)?;

        working.ledger.remove_stake(owner)?;
        working
            .ledger
            .close_trove(owner, TroveStatus::ClosedByLiquidation)?;
        working.registry.remove(owner)?;

        tracing::debug!(
            owner = %owner,
            icr,
            entire_debt,
            entire_collateral,
            gas_compensation,
            debt_to_offset,
            debt_to_redistribute,
            "trove liquidated"
        );

        Ok(LiquidationValues {
            owner: *owner,
            entire_debt,
            entire_collateral,
            gas_compensation,
            collateral_liquidated,
            debt_to_offset,
            coll_to_offset,
            debt_to_redistribute,
            coll_to_redistribute,
            icr,
        })
    }

    /// Move the aggregated amounts between the pools and pay the caller's
    /// compensation out of the ActivePool. Snapshots are refreshed before the
    /// compensation leaves, so they exclude it but include everything
    /// redistributed.
    fn settle(working: &mut SystemState, totals: &LiquidationTotals) -> Result<()> {
        working
            .ledger
            .debit_active_pool(totals.total_debt_offset, totals.total_collateral_offset)?;
        working
            .stability_pool
            .offset(totals.total_debt_offset, totals.total_collateral_offset)?;
        working.ledger.redistribute(
            totals.total_debt_redistributed,
            totals.total_collateral_redistributed,
        )?;
        working
            .ledger
            .update_system_snapshots(totals.total_gas_compensation)?;
        working
            .ledger
            .send_collateral_from_active(totals.total_gas_compensation)?;
        Ok(())
    }

    fn record(
        &mut self,
        caller: Address,
        price: u128,
        liquidated: &[LiquidationValues],
        totals: &LiquidationTotals,
    ) {
        self.total_calls += 1;
        self.total_troves_liquidated += totals.troves_liquidated;
        self.total_debt_liquidated = self
            .total_debt_liquidated
            .saturating_add(totals.total_debt_liquidated);
        self.total_collateral_liquidated = self
            .total_collateral_liquidated
            .saturating_add(totals.total_collateral_liquidated);
        self.total_gas_compensation_paid = self
            .total_gas_compensation_paid
            .saturating_add(totals.total_gas_compensation);
        self.total_debt_offset = self
            .total_debt_offset
            .saturating_add(totals.total_debt_offset);
        self.total_debt_redistributed = self
            .total_debt_redistributed
            .saturating_add(totals.total_debt_redistributed);

        for values in liquidated {
            self.sequence += 1;
            self.add_event(LiquidationEvent {
                sequence: self.sequence,
                owner: values.owner,
                caller,
                debt_liquidated: values.entire_debt,
                collateral_liquidated: values.collateral_liquidated,
                gas_compensation: values.gas_compensation,
                debt_offset: values.debt_to_offset,
                debt_redistributed: values.debt_to_redistribute,
                price,
                icr: values.icr,
            });
        }

        tracing::info!(
            troves = totals.troves_liquidated,
            debt = totals.total_debt_liquidated,
            collateral = totals.total_collateral_liquidated,
            gas_compensation = totals.total_gas_compensation,
            price,
            "liquidation committed"
        );
    }

    /// Add an event (with pruning)
    fn add_event(&mut self, event: LiquidationEvent) {
        self.events.push(event);

        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Troves closed over the engine's lifetime
    pub fn total_troves_liquidated(&self) -> u64 {
        self.total_troves_liquidated
    }

    /// Retained events, oldest first
    pub fn recent_events(&self) -> &[LiquidationEvent] {
        &self.events
    }

    /// Retained events for one Trove owner
    pub fn events_for(&self, owner: &Address) -> Vec<&LiquidationEvent> {
        self.events.iter().filter(|e| e.owner == *owner).collect()
    }

    /// Engine statistics
    pub fn statistics(&self) -> LiquidationStatistics {
        let average_icr_at_liquidation = if self.events.is_empty() {
            0
        } else {
            let sum: u128 = self.events.iter().map(|e| e.icr).sum();
            sum / self.events.len() as u128
        };

        LiquidationStatistics {
            total_calls: self.total_calls,
            total_troves_liquidated: self.total_troves_liquidated,
            total_debt_liquidated: self.total_debt_liquidated,
            total_collateral_liquidated: self.total_collateral_liquidated,
            total_gas_compensation_paid: self.total_gas_compensation_paid,
            total_debt_offset: self.total_debt_offset,
            total_debt_redistributed: self.total_debt_redistributed,
            average_icr_at_liquidation,
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Cumulative engine statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiquidationStatistics {
    /// Calls that committed at least one liquidation
    pub total_calls: u64,
    /// Troves closed
    pub total_troves_liquidated: u64,
    /// Debt settled
    pub total_debt_liquidated: u128,
    /// Collateral settled (compensation excluded)
    pub total_collateral_liquidated: u128,
    /// Compensation paid to callers
    pub total_gas_compensation_paid: u128,
    /// Debt absorbed by the stability pool
    pub total_debt_offset: u128,
    /// Debt redistributed to active Troves
    pub total_debt_redistributed: u128,
    /// Mean ICR across retained events
    pub average_icr_at_liquidation: u128,
}
