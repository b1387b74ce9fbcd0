//! # filUSD Liquidation Engine
//!
//! The liquidation and gas-compensation core of filUSD, a CDP stablecoin
//! backed by FIL collateral. Borrowers lock FIL in Troves and mint fUSD
//! against it; when a Trove's collateral ratio falls below the minimum,
//! anyone may liquidate it, earning a collateral compensation while the
//! debt is offset against the stability pool or redistributed across the
//! remaining Troves.
//!
//! ## Architecture
//!
//! - **Core**: Trove records, the ledger with its aggregate pools, the
//!   sorted registry, engine parameters, and borrower operations
//! - **Liquidation**: the liquidation engine, gas compensation math, and
//!   the stability pool
//! - **Oracle**: the price feed the engine reads FIL/USD prices from
//! - **System**: the aggregate state with a deterministic digest
//!
//! The engine is deterministic and purely in-memory: identical call
//! sequences produce bit-for-bit identical state digests, so independent
//! replicas can cross-check each other. Every failed operation leaves the
//! state untouched.
//!
//! ## Example
//!
//! ```rust,ignore
//! use filusd::prelude::*;
//! use filusd::core::borrower;
//!
//! let mut state = SystemState::new(EngineParams::default())?;
//! let oracle = PriceFeed::with_price(400 * DECIMAL_PRECISION)?;
//!
//! borrower::open_trove(&mut state, &oracle, owner, collateral, debt, None)?;
//!
//! let mut engine = LiquidationEngine::new();
//! let totals = engine.liquidate_troves(&mut state, &oracle, 10, caller)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod core;
pub mod error;
pub mod liquidation;
pub mod oracle;
pub mod system;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::EngineParams,
        ledger::TroveLedger,
        sorted::SortedTroves,
        trove::{Trove, TroveStatus},
    };
    pub use crate::error::{Error, Result};
    pub use crate::liquidation::{
        engine::{LiquidationEngine, LiquidationTotals},
        stability_pool::StabilityPool,
    };
    pub use crate::oracle::price_feed::{PriceFeed, PriceOracle};
    pub use crate::system::SystemState;
    pub use crate::utils::{address::Address, constants::DECIMAL_PRECISION};
}

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "filUSD";
