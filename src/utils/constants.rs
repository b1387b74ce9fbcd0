//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED-POINT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// 18-decimal fixed-point scale shared by collateral, debt, prices and ratios
pub const DECIMAL_PRECISION: u128 = 1_000_000_000_000_000_000;

/// attoFIL per FIL (Filecoin's native 18-decimal base unit)
pub const ATTOFIL_PER_FIL: u128 = DECIMAL_PRECISION;

/// 100% as an 18-decimal ratio
pub const ONE_HUNDRED_PERCENT: u128 = DECIMAL_PRECISION;

/// Largest collateral or debt amount the engine is specified for (1e27, one
/// billion whole units)
pub const MAX_SUPPORTED_AMOUNT: u128 = 1_000_000_000 * DECIMAL_PRECISION;

/// Largest oracle price the engine is specified for (1e30, a trillion USD
/// per unit)
pub const MAX_SUPPORTED_PRICE: u128 = 1_000_000_000_000 * DECIMAL_PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERALIZATION CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum Collateral Ratio (MCR) - 110%
/// Below this ratio, a Trove can be liquidated
pub const DEFAULT_MCR: u128 = 1_100_000_000_000_000_000;

/// Fixed reference price used for the nominal ICR that orders the registry -
/// $100 per FIL
pub const NOMINAL_PRICE: u128 = 100 * DECIMAL_PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// GAS COMPENSATION CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Virtual debt added to every Trove for ICR purposes - 200 fUSD.
/// Reserved as liquidation-incentive headroom; never minted or settled.
pub const DEFAULT_GAS_COMPENSATION: u128 = 200 * DECIMAL_PRECISION;

/// Divisor for the collateral-side compensation fraction (1/200 = 0.5%)
pub const PERCENT_DIVISOR: u128 = 200;

/// Minimum USD value of the collateral-side compensation - $10
pub const MIN_COLL_GAS_COMP_VALUE: u128 = 10 * DECIMAL_PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// DEBT LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum borrowable debt per Trove - 1800 fUSD, preventing dust Troves
pub const DEFAULT_MIN_NET_DEBT: u128 = 1_800 * DECIMAL_PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY POOL CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Precision guard for the stability pool product factor: when the running
/// product drops below 1e9 it is rescaled up by this factor and the scale
/// counter advances
pub const SP_SCALE_FACTOR: u128 = 1_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum liquidation events retained in the engine's history
pub const MAX_LIQUIDATION_HISTORY: usize = 1_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of a borrower address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a state digest in bytes (SHA256)
pub const DIGEST_LENGTH: usize = 32;
