//! FIL/USD price feed.
//!
//! The engine reads the price exactly once per liquidation call through the
//! [`PriceOracle`] trait; this module provides the feed implementation the
//! tooling pushes prices into. A zero price is a legal reading (the
//! degenerate-valuation path downstream handles it), only a price that was
//! never set at all is an error.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::MAX_SUPPORTED_PRICE;

/// Warn when one update moves the price by more than this many basis points
const DEVIATION_WARN_BPS: u128 = 5_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the FIL/USD price the engine values collateral at
pub trait PriceOracle {
    /// The current price, 18 decimals. Zero is a valid reading.
    fn price(&self) -> Result<u128>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// Price feed fed by external tooling, consumed by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    /// Latest accepted price
    current: Option<u128>,
    /// Price before the latest update
    previous: Option<u128>,
    /// Recent accepted prices, newest last
    history: Vec<u128>,
    /// Maximum history size
    max_history: usize,
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeed {
    /// Create a feed with no price set
    pub fn new() -> Self {
        Self {
            current: None,
            previous: None,
            history: Vec::new(),
            max_history: 100,
        }
    }

    /// Create a feed pre-seeded with a price
    pub fn with_price(price: u128) -> Result<Self> {
        let mut feed = Self::new();
        feed.set_price(price)?;
        Ok(feed)
    }

    /// Accept a new price reading. Zero is allowed; readings above the
    /// supported range are rejected. Large swings are logged, not refused,
    /// since liquidation must keep working through a crash.
    pub fn set_price(&mut self, price: u128) -> Result<()> {
        if price > MAX_SUPPORTED_PRICE {
            return Err(Error::PriceOutOfBounds {
                price,
                max: MAX_SUPPORTED_PRICE,
            });
        }

        if let Some(previous) = self.current {
            if previous > 0 {
                let delta = previous.abs_diff(price);
                let deviation_bps = delta.saturating_mul(10_000) / previous;
                if deviation_bps > DEVIATION_WARN_BPS {
                    tracing::warn!(previous, price, deviation_bps, "large price movement");
                }
            }
        }

        self.previous = self.current;
        self.current = Some(price);
        self.history.push(price);
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        tracing::debug!(price, "price updated");
        Ok(())
    }

    /// The reading before the latest update
    pub fn previous_price(&self) -> Option<u128> {
        self.previous
    }

    /// Recent accepted prices, newest last
    pub fn history(&self) -> &[u128] {
        &self.history
    }
}

impl PriceOracle for PriceFeed {
    fn price(&self) -> Result<u128> {
        self.current.ok_or(Error::PriceNotSet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::DECIMAL_PRECISION;

    #[test]
    fn test_price_must_be_set_before_reading() {
        let feed = PriceFeed::new();
        assert_eq!(feed.price(), Err(Error::PriceNotSet));

        let feed = PriceFeed::with_price(200 * DECIMAL_PRECISION).unwrap();
        assert_eq!(feed.price().unwrap(), 200 * DECIMAL_PRECISION);
    }

    #[test]
    fn test_zero_price_is_a_valid_reading() {
        let mut feed = PriceFeed::new();
        feed.set_price(0).unwrap();
        assert_eq!(feed.price().unwrap(), 0);
    }

    #[test]
    fn test_out_of_range_price_rejected() {
        let mut feed = PriceFeed::new();
        assert!(matches!(
            feed.set_price(MAX_SUPPORTED_PRICE + 1),
            Err(Error::PriceOutOfBounds { .. })
        ));
        feed.set_price(MAX_SUPPORTED_PRICE).unwrap();
    }

    #[test]
    fn test_history_and_previous_tracked() {
        let mut feed = PriceFeed::new();
        feed.set_price(100 * DECIMAL_PRECISION).unwrap();
        feed.set_price(90 * DECIMAL_PRECISION).unwrap();

        assert_eq!(feed.previous_price(), Some(100 * DECIMAL_PRECISION));
        assert_eq!(feed.price().unwrap(), 90 * DECIMAL_PRECISION);
        assert_eq!(feed.history().len(), 2);
    }
}
