//! Liquidation modules for the filUSD engine.
//!
//! This module handles liquidations and the stability pool:
//! - Liquidation engine for undercollateralized Troves
//! - Gas compensation paid to liquidation callers
//! - Stability pool absorbing liquidated debt against fUSD deposits

pub mod compensation;
pub mod engine;
pub mod stability_pool;

pub use compensation::*;
pub use engine::*;
pub use stability_pool::*;
