//! Trove state.
//!
//! A Trove is a single borrower's collateralized debt position: locked FIL
//! collateral against minted fUSD debt. Each borrower address owns at most
//! one Trove at a time. Records are never deleted; a closed Trove keeps its
//! terminal status with zeroed live fields.

use serde::{Deserialize, Serialize};

use crate::utils::address::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// TROVE STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle status of a Trove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TroveStatus {
    /// Never opened
    #[default]
    NonExistent,
    /// Open, with live debt and collateral, present in the sorted registry
    Active,
    /// Closed by the owner repaying in full
    ClosedByOwner,
    /// Closed by the liquidation engine
    ClosedByLiquidation,
    /// Closed by a redemption against it
    ClosedByRedemption,
}

impl TroveStatus {
    /// Whether the Trove is open and live
    pub fn is_active(&self) -> bool {
        matches!(self, TroveStatus::Active)
    }

    /// Whether the Trove has been closed (by any path)
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            TroveStatus::ClosedByOwner
                | TroveStatus::ClosedByLiquidation
                | TroveStatus::ClosedByRedemption
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWARD SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// The redistribution accumulator values last applied to a Trove.
///
/// Pending rewards are the Trove's stake times the growth of the global
/// accumulators since this snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSnapshot {
    /// Collateral accumulator (`l_coll`) at the last application
    pub coll: u128,
    /// Debt accumulator (`l_debt`) at the last application
    pub debt: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TROVE
// ═══════════════════════════════════════════════════════════════════════════════

/// A single collateralized debt position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trove {
    /// Owning borrower address (also the ledger key)
    pub owner: Address,
    /// Outstanding fUSD debt, 18 decimals, excluding virtual gas compensation
    pub debt: u128,
    /// Locked collateral in attoFIL
    pub collateral: u128,
    /// Snapshot-adjusted share used for proportional redistribution
    pub stake: u128,
    /// Lifecycle status
    pub status: TroveStatus,
    /// Accumulator values last applied to this Trove
    pub reward_snapshot: RewardSnapshot,
}

impl Trove {
    /// Create a new active Trove. The stake starts at zero and is set by the
    /// ledger when the Trove is registered.
    pub fn new(owner: Address, collateral: u128, debt: u128) -> Self {
        Self {
            owner,
            debt,
            collateral,
            stake: 0,
            status: TroveStatus::Active,
            reward_snapshot: RewardSnapshot::default(),
        }
    }

    /// Whether the Trove is open and live
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
