//! Core modules for the filUSD engine.
//!
//! This module contains the fundamental building blocks:
//! - Engine parameters and their validation
//! - Trove records and lifecycle states
//! - The Trove ledger with its aggregate pools and redistribution tracking
//! - The sorted Trove registry ordered by nominal ICR
//! - Borrower operations for opening, adjusting and closing Troves

pub mod borrower;
pub mod config;
pub mod ledger;
pub mod sorted;
pub mod trove;

pub use config::*;
pub use ledger::*;
pub use sorted::*;
pub use trove::*;
