//! Engine configuration.
//!
//! The protocol parameters are set once at system initialization and never
//! change afterwards. They are threaded explicitly into every component that
//! needs them; there is no global configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable protocol parameters (set at deployment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Minimum collateral ratio, 18 decimals (1.1e18 = 110%).
    /// A Trove whose ICR drops below this becomes liquidation-eligible.
    pub mcr: u128,

    /// Minimum borrowable net debt per Trove, 18 decimals.
    /// Prevents dust Troves whose liquidation would not cover its own cost.
    pub min_net_debt: u128,

    /// Virtual debt added to every Trove for ICR purposes, 18 decimals.
    /// Reserved as liquidation-incentive headroom; never minted or settled.
    pub gas_compensation: u128,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            mcr: DEFAULT_MCR,
            min_net_debt: DEFAULT_MIN_NET_DEBT,
            gas_compensation: DEFAULT_GAS_COMPENSATION,
        }
    }
}

impl EngineParams {
    /// Create with a custom MCR (for testing)
    pub fn with_mcr(mut self, mcr: u128) -> Self {
        self.mcr = mcr;
        self
    }

    /// Create with a custom minimum net debt (for testing)
    pub fn with_min_net_debt(mut self, min_net_debt: u128) -> Self {
        self.min_net_debt = min_net_debt;
        self
    }

    /// Create with a custom gas compensation (for testing)
    pub fn with_gas_compensation(mut self, gas_compensation: u128) -> Self {
        self.gas_compensation = gas_compensation;
        self
    }

    /// Validate that the parameters are consistent
    pub fn validate(&self) -> Result<()> {
        if self.mcr <= ONE_HUNDRED_PERCENT {
            return Err(Error::InvalidConfiguration(format!(
                "mcr {} must exceed 100%",
                self.mcr
            )));
        }
        if self.mcr >= 10 * ONE_HUNDRED_PERCENT {
            return Err(Error::InvalidConfiguration(format!(
                "mcr {} is implausibly high",
                self.mcr
            )));
        }
        if self.min_net_debt == 0 {
            return Err(Error::InvalidConfiguration(
                "min_net_debt must be nonzero".into(),
            ));
        }
        if self.gas_compensation == 0 {
            return Err(Error::InvalidConfiguration(
                "gas_compensation must be nonzero".into(),
            ));
        }
        Ok(())
    }
}
