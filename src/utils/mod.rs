//! Utility modules for the filUSD engine.
//!
//! This module contains shared utilities used across the engine:
//! - Borrower addresses
//! - Fixed-point arithmetic with widened intermediates
//! - Protocol constants

pub mod address;
pub mod constants;
pub mod math;

pub use address::*;
pub use constants::*;
pub use math::*;
