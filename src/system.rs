//! Aggregate system state.
//!
//! `SystemState` bundles everything a liquidation acts on: the engine
//! parameters, the Trove ledger with its two pools, the sorted registry, and
//! the stability pool. The liquidation engine clones the state, mutates the
//! clone, and swaps it back only once every step has succeeded, so a failed
//! call leaves no partial mutation behind.
//!
//! The state serializes with bincode. All map fields are `BTreeMap`s, so the
//! encoding is deterministic and `digest()` gives a bit-for-bit fingerprint:
//! two states hash equal iff every field is identical.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::config::EngineParams;
use crate::core::ledger::TroveLedger;
use crate::core::sorted::SortedTroves;
use crate::error::{Error, Result};
use crate::liquidation::stability_pool::StabilityPool;
use crate::utils::constants::{DECIMAL_PRECISION, DIGEST_LENGTH};
use crate::utils::math::compute_icr;

// ═══════════════════════════════════════════════════════════════════════════════
// SYSTEM STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// The complete state of the liquidation system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemState {
    /// Immutable engine parameters
    pub params: EngineParams,
    /// Trove records, stakes, and the ActivePool/DefaultPool
    pub ledger: TroveLedger,
    /// Active Troves ordered by descending nominal ICR
    pub registry: SortedTroves,
    /// fUSD deposits that liquidated debt is offset against
    pub stability_pool: StabilityPool,
}

impl SystemState {
    /// Create an empty system with validated parameters
    pub fn new(params: EngineParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            ..Default::default()
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Total debt across both pools, applied and redistributed
    pub fn entire_system_debt(&self) -> u128 {
        self.ledger.entire_system_debt()
    }

    /// Total collateral across both pools
    pub fn entire_system_collateral(&self) -> u128 {
        self.ledger.entire_system_collateral()
    }

    /// The system-wide collateral ratio at the given price. Maximal when the
    /// system carries no debt.
    pub fn total_collateral_ratio(&self, price: u128) -> Result<u128> {
        compute_icr(
            self.entire_system_collateral(),
            self.entire_system_debt(),
            price,
        )
    }

    /// One-line summary for logging
    pub fn summary(&self) -> String {
        format!(
            "troves: {}, debt: {:.2} fUSD, collateral: {:.4} FIL, pool deposits: {:.2} fUSD",
            self.ledger.active_trove_count(),
            self.entire_system_debt() as f64 / DECIMAL_PRECISION as f64,
            self.entire_system_collateral() as f64 / DECIMAL_PRECISION as f64,
            self.stability_pool.total_debt_token_deposits() as f64 / DECIMAL_PRECISION as f64,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INVARIANTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Cross-component consistency checks
    pub fn verify_invariants(&self) -> Result<()> {
        let active = self.ledger.active_trove_count();
        let listed = self.registry.len() as u64;
        if active != listed {
            return Err(Error::InvariantViolation(format!(
                "{} active troves but {} registry entries",
                active, listed
            )));
        }
        if !self.registry.is_ordered() {
            return Err(Error::InvariantViolation(
                "registry keys are not non-increasing".to_string(),
            ));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// SHA-256 of the bincode encoding
    pub fn digest(&self) -> [u8; DIGEST_LENGTH] {
        let data = bincode::serialize(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&data);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::address::Address;
    use crate::utils::constants::DEFAULT_MCR;

    const FIL: u128 = DECIMAL_PRECISION;

    #[test]
    fn test_new_validates_params() {
        let state = SystemState::new(EngineParams::default()).unwrap();
        assert_eq!(state.params.mcr, DEFAULT_MCR);
        assert_eq!(state.ledger.active_trove_count(), 0);
        assert!(state.registry.is_empty());

        let bad = EngineParams::default().with_mcr(0);
        assert!(matches!(
            SystemState::new(bad),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_total_collateral_ratio() {
        let mut state = SystemState::default();
        state
            .ledger
            .open_trove(Address::random(), 10 * FIL, 2_000 * FIL)
            .unwrap();

        // 10 FIL at $400 = $4,000 against 2,000 fUSD: TCR 200%
        let tcr = state.total_collateral_ratio(400 * FIL).unwrap();
        assert_eq!(tcr, 2 * DECIMAL_PRECISION);

        // no debt means infinitely safe
        let empty = SystemState::default();
        assert_eq!(empty.total_collateral_ratio(400 * FIL).unwrap(), u128::MAX);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut state = SystemState::default();
        let a = Address::from_slice(&[7u8; 20]).unwrap();
        state.ledger.open_trove(a, 10 * FIL, 2_000 * FIL).unwrap();
        state.registry.insert(a, 55 * DECIMAL_PRECISION, None).unwrap();
        state.stability_pool.provide(a, 500 * FIL).unwrap();

        let bytes = state.to_bytes().unwrap();
        let restored = SystemState::from_bytes(&bytes).unwrap();

        assert_eq!(restored.ledger.active_trove_count(), 1);
        assert_eq!(restored.ledger.trove(&a).unwrap().collateral, 10 * FIL);
        assert_eq!(restored.registry.key_of(&a), Some(55 * DECIMAL_PRECISION));
        assert_eq!(restored.stability_pool.total_debt_token_deposits(), 500 * FIL);
        assert_eq!(restored.digest(), state.digest());
    }

    #[test]
    fn test_digest_tracks_state_changes() {
        let mut state = SystemState::default();
        let before = state.digest();
        state
            .ledger
            .open_trove(Address::from_slice(&[9u8; 20]).unwrap(), FIL, FIL)
            .unwrap();
        assert_ne!(state.digest(), before);

        // a clone hashes identically
        assert_eq!(state.clone().digest(), state.digest());
    }

    #[test]
    fn test_verify_invariants_catches_mismatch() {
        let mut state = SystemState::default();
        assert!(state.verify_invariants().is_ok());

        // registry entry without a ledger record
        state
            .registry
            .insert(Address::random(), DECIMAL_PRECISION, None)
            .unwrap();
        assert!(matches!(
            state.verify_invariants(),
            Err(Error::InvariantViolation(_))
        ));
    }
}
