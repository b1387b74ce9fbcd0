//! Stability Pool: fUSD deposits that absorb liquidated debt.
//!
//! When the engine offsets a liquidation against the pool, every deposit
//! shrinks pro rata and the pool is credited with the liquidated collateral,
//! which depositors later claim pro rata. Both effects are tracked lazily:
//! a running product `p` compounds the losses and per-(epoch, scale) sums
//! accumulate the collateral gains, so a deposit's current value and gain
//! are derived from the snapshot taken when it was last touched.
//!
//! When an offset consumes the pool entirely the epoch advances and the
//! product restarts, emptying every live deposit while leaving their accrued
//! gains claimable. The product is rescaled by 1e9 whenever it would lose
//! precision; a deposit more than one scale behind is treated as zero.

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::{DECIMAL_PRECISION, SP_SCALE_FACTOR};
use crate::utils::math::{narrow, safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// DEPOSITOR SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Pool factors captured when a deposit was last touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositorSnapshot {
    /// Product factor at snapshot time
    pub p: u128,
    /// Collateral gain sum at snapshot time, for the snapshot's epoch/scale
    pub s: u128,
    /// Epoch at snapshot time
    pub epoch: u64,
    /// Scale at snapshot time
    pub scale: u64,
}

impl Default for DepositorSnapshot {
    fn default() -> Self {
        Self {
            p: DECIMAL_PRECISION,
            s: 0,
            epoch: 0,
            scale: 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPOSIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A single fUSD deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Depositor address
    pub owner: Address,
    /// Deposit amount when last touched
    pub initial_amount: u128,
    /// Pool factors when last touched
    pub snapshot: DepositorSnapshot,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// The pool of fUSD deposits that liquidated debt is offset against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityPool {
    /// Total fUSD currently deposited
    total_deposits: u128,
    /// Collateral gained from liquidations, not yet claimed
    collateral_balance: u128,
    /// Running product compounding deposit losses
    p: u128,
    /// Collateral gain sums, keyed by (epoch, scale)
    epoch_scale_sums: BTreeMap<(u64, u64), u128>,
    /// Current epoch; advances each time the pool is fully consumed
    epoch: u64,
    /// Current scale; advances each time the product is rescaled
    scale: u64,
    /// Individual deposits
    deposits: BTreeMap<Address, Deposit>,
    /// Offset error-feedback terms
    last_coll_error_offset: u128,
    last_debt_loss_error_offset: u128,
    /// Liquidations absorbed
    total_liquidations: u64,
    /// Debt absorbed over the pool's lifetime
    total_debt_absorbed: u128,
}

impl Default for StabilityPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StabilityPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            total_deposits: 0,
            collateral_balance: 0,
            p: DECIMAL_PRECISION,
            epoch_scale_sums: BTreeMap::new(),
            epoch: 0,
            scale: 0,
            deposits: BTreeMap::new(),
            last_coll_error_offset: 0,
            last_debt_loss_error_offset: 0,
            total_liquidations: 0,
            total_debt_absorbed: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Total fUSD available to offset liquidations against
    pub fn total_debt_token_deposits(&self) -> u128 {
        self.total_deposits
    }

    /// Collateral held for depositors from absorbed liquidations
    pub fn collateral_balance(&self) -> u128 {
        self.collateral_balance
    }

    /// Number of depositors with a live record
    pub fn depositor_count(&self) -> usize {
        self.deposits.len()
    }

    /// Liquidations absorbed over the pool's lifetime
    pub fn total_liquidations(&self) -> u64 {
        self.total_liquidations
    }

    /// Debt absorbed over the pool's lifetime
    pub fn total_debt_absorbed(&self) -> u128 {
        self.total_debt_absorbed
    }

    /// The deposit record for an owner
    pub fn deposit(&self, owner: &Address) -> Option<&Deposit> {
        self.deposits.get(owner)
    }

    fn sum_at(&self, epoch: u64, scale: u64) -> u128 {
        self.epoch_scale_sums
            .get(&(epoch, scale))
            .copied()
            .unwrap_or(0)
    }

    /// The deposit's current value after the losses compounded since its
    /// snapshot
    pub fn compounded_deposit(&self, owner: &Address) -> Result<u128> {
        let Some(deposit) = self.deposits.get(owner) else {
            return Ok(0);
        };
        let snapshot = deposit.snapshot;
        // an epoch change means some offset consumed the pool entirely
        if snapshot.epoch < self.epoch {
            return Ok(0);
        }

        let scale_diff = self.scale - snapshot.scale;
        let compounded = match scale_diff {
            0 => narrow(
                U256::from(deposit.initial_amount) * U256::from(self.p) / U256::from(snapshot.p),
                "compounded deposit",
            )?,
            1 => narrow(
                U256::from(deposit.initial_amount) * U256::from(self.p)
                    / U256::from(snapshot.p)
                    / U256::from(SP_SCALE_FACTOR),
                "compounded deposit",
            )?,
            _ => 0,
        };
        Ok(compounded)
    }

    /// Collateral the depositor has earned from offsets since its snapshot
    pub fn collateral_gain(&self, owner: &Address) -> Result<u128> {
        let Some(deposit) = self.deposits.get(owner) else {
            return Ok(0);
        };
        let snapshot = deposit.snapshot;

        // gains only accrue within the snapshot's epoch, over at most two
        // scales of the product
        let first_portion = safe_sub(self.sum_at(snapshot.epoch, snapshot.scale), snapshot.s)?;
        let second_portion = self.sum_at(snapshot.epoch, snapshot.scale + 1) / SP_SCALE_FACTOR;

        let gain = U256::from(deposit.initial_amount)
            * (U256::from(first_portion) + U256::from(second_portion))
            / U256::from(snapshot.p)
            / U256::from(DECIMAL_PRECISION);
        narrow(gain, "collateral gain")
    }

    fn current_snapshot(&self) -> DepositorSnapshot {
        DepositorSnapshot {
            p: self.p,
            s: self.sum_at(self.epoch, self.scale),
            epoch: self.epoch,
            scale: self.scale,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSITS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit fUSD. Any collateral gain accrued so far is paid out and the
    /// deposit re-snapshots at its compounded value plus the new amount.
    /// Returns the collateral paid out.
    pub fn provide(&mut self, owner: Address, amount: u128) -> Result<u128> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }

        let gain = self.collateral_gain(&owner)?;
        let compounded = self.compounded_deposit(&owner)?;

        let new_value = safe_add(compounded, amount)?;
        self.deposits.insert(
            owner,
            Deposit {
                owner,
                initial_amount: new_value,
                snapshot: self.current_snapshot(),
            },
        );

        self.total_deposits = safe_add(self.total_deposits, amount)?;
        self.collateral_balance = safe_sub(self.collateral_balance, gain)?;

        tracing::debug!(owner = %owner, amount, compounded, gain, "stability deposit provided");
        Ok(gain)
    }

    /// Withdraw up to `amount` fUSD, capped at the deposit's compounded
    /// value. The full collateral gain is paid out alongside. Returns
    /// `(withdrawn, collateral_gain)`.
    pub fn withdraw(&mut self, owner: &Address, amount: u128) -> Result<(u128, u128)> {
        if !self.deposits.contains_key(owner) {
            return Err(Error::NoDeposit(owner.to_string()));
        }

        let gain = self.collateral_gain(owner)?;
        let compounded = self.compounded_deposit(owner)?;
        let to_withdraw = amount.min(compounded);
        let remaining = compounded - to_withdraw;

        if remaining == 0 {
            self.deposits.remove(owner);
        } else {
            self.deposits.insert(
                *owner,
                Deposit {
                    owner: *owner,
                    initial_amount: remaining,
                    snapshot: self.current_snapshot(),
                },
            );
        }

        self.total_deposits = safe_sub(self.total_deposits, to_withdraw)?;
        self.collateral_balance = safe_sub(self.collateral_balance, gain)?;

        tracing::debug!(owner = %owner, to_withdraw, gain, "stability deposit withdrawn");
        Ok((to_withdraw, gain))
    }

    /// Pay out the accrued collateral gain without touching the fUSD side
    pub fn claim_collateral(&mut self, owner: &Address) -> Result<u128> {
        if !self.deposits.contains_key(owner) {
            return Err(Error::NoDeposit(owner.to_string()));
        }

        let gain = self.collateral_gain(owner)?;
        let compounded = self.compounded_deposit(owner)?;

        if compounded == 0 {
            self.deposits.remove(owner);
        } else {
            self.deposits.insert(
                *owner,
                Deposit {
                    owner: *owner,
                    initial_amount: compounded,
                    snapshot: self.current_snapshot(),
                },
            );
        }

        self.collateral_balance = safe_sub(self.collateral_balance, gain)?;
        Ok(gain)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OFFSET
    // ═══════════════════════════════════════════════════════════════════════════

    /// Cancel `debt` against the pooled deposits and credit the pool with
    /// `collateral`. The caller sizes `debt` to at most the pooled total.
    pub fn offset(&mut self, debt: u128, collateral: u128) -> Result<()> {
        if debt == 0 && collateral == 0 {
            return Ok(());
        }
        let total = self.total_deposits;
        if total == 0 || debt > total {
            return Err(Error::InsufficientStabilityPool {
                required: debt,
                available: total,
            });
        }

        // collateral gain per unit deposited, remainder carried forward
        let coll_numerator = U256::from(collateral) * U256::from(DECIMAL_PRECISION)
            + U256::from(self.last_coll_error_offset);
        let coll_gain_per_unit = coll_numerator / U256::from(total);
        self.last_coll_error_offset = narrow(
            coll_numerator - coll_gain_per_unit * U256::from(total),
            "offset collateral error",
        )?;

        // debt loss per unit deposited, rounded up so the pool never
        // undershoots the cancelled debt
        let debt_loss_per_unit = if debt == total {
            self.last_debt_loss_error_offset = 0;
            DECIMAL_PRECISION
        } else {
            let debt_numerator = U256::from(debt) * U256::from(DECIMAL_PRECISION)
                - U256::from(self.last_debt_loss_error_offset);
            let per_unit = debt_numerator / U256::from(total) + U256::from(1u8);
            self.last_debt_loss_error_offset = narrow(
                per_unit * U256::from(total) - debt_numerator,
                "offset debt error",
            )?;
            narrow(per_unit, "offset debt loss per unit")?
        };

        // fold the gain into the sum for the current epoch and scale
        let marginal_gain = narrow(
            coll_gain_per_unit * U256::from(self.p),
            "offset marginal gain",
        )?;
        let sum = self
            .epoch_scale_sums
            .entry((self.epoch, self.scale))
            .or_insert(0);
        *sum = safe_add(*sum, marginal_gain)?;

        // compound the loss into the product
        let product_factor = DECIMAL_PRECISION - debt_loss_per_unit;
        if product_factor == 0 {
            self.epoch += 1;
            self.scale = 0;
            self.p = DECIMAL_PRECISION;
        } else {
            let candidate =
                U256::from(self.p) * U256::from(product_factor) / U256::from(DECIMAL_PRECISION);
            self.p = if candidate < U256::from(SP_SCALE_FACTOR) {
                self.scale += 1;
                narrow(
                    U256::from(self.p) * U256::from(product_factor) * U256::from(SP_SCALE_FACTOR)
                        / U256::from(DECIMAL_PRECISION),
                    "offset product rescale",
                )?
            } else {
                narrow(candidate, "offset product")?
            };
            if self.p == 0 {
                return Err(Error::InvariantViolation(
                    "stability pool product underflowed to zero".to_string(),
                ));
            }
        }

        self.total_deposits = safe_sub(total, debt)?;
        self.collateral_balance = safe_add(self.collateral_balance, collateral)?;
        self.total_liquidations += 1;
        self.total_debt_absorbed = safe_add(self.total_debt_absorbed, debt)?;

        tracing::debug!(
            debt,
            collateral,
            remaining_deposits = self.total_deposits,
            epoch = self.epoch,
            scale = self.scale,
            "stability pool offset"
        );
        Ok(())
    }

    /// Pool statistics
    pub fn statistics(&self) -> StabilityPoolStats {
        StabilityPoolStats {
            total_deposits: self.total_deposits,
            collateral_balance: self.collateral_balance,
            depositor_count: self.deposits.len() as u64,
            total_liquidations: self.total_liquidations,
            total_debt_absorbed: self.total_debt_absorbed,
            current_epoch: self.epoch,
            current_scale: self.scale,
        }
    }
}

/// Stability pool statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StabilityPoolStats {
    /// Total fUSD deposited
    pub total_deposits: u128,
    /// Collateral held for depositors
    pub collateral_balance: u128,
    /// Number of depositors
    pub depositor_count: u64,
    /// Liquidations absorbed
    pub total_liquidations: u64,
    /// Debt absorbed over the pool's lifetime
    pub total_debt_absorbed: u128,
    /// Current epoch
    pub current_epoch: u64,
    /// Current scale
    pub current_scale: u64,
}
