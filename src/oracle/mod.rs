//! Oracle module for price feeds.
//!
//! The engine reads FIL/USD prices through the [`PriceOracle`] trait; the
//! in-memory [`PriceFeed`] implements it for deterministic operation, with
//! prices pushed in by the surrounding environment.

pub mod price_feed;

pub use price_feed::*;
