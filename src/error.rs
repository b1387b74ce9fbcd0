//! Error types for the filUSD liquidation engine.
//!
//! This module defines all error types used throughout the engine,
//! providing clear and actionable error messages.

use thiserror::Error;

/// Result type alias for filUSD operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the filUSD liquidation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Trove Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Trove not found in the ledger
    #[error("Trove not found: {0}")]
    TroveNotFound(String),

    /// The borrower already has an open Trove
    #[error("Trove already exists for {0}")]
    TroveAlreadyExists(String),

    /// Trove exists but is not active
    #[error("Trove is not active: {0}")]
    TroveNotActive(String),

    /// Insufficient collateral for the requested operation
    #[error("Insufficient collateral: requested {requested}, available {available}")]
    InsufficientCollateral {
        /// Requested collateral amount
        requested: u128,
        /// Available collateral amount
        available: u128,
    },

    /// Collateral ratio below the minimum
    #[error("ICR {icr} below minimum collateral ratio {mcr}")]
    IcrBelowMcr {
        /// Resulting individual collateral ratio (18 decimals)
        icr: u128,
        /// Minimum collateral ratio (18 decimals)
        mcr: u128,
    },

    /// Debt below the protocol minimum
    #[error("Net debt {amount} below minimum {minimum}")]
    DebtBelowMinimum {
        /// Requested or resulting net debt
        amount: u128,
        /// Protocol minimum net debt
        minimum: u128,
    },

    /// Repayment larger than the outstanding debt
    #[error("Repayment {amount} exceeds outstanding debt {debt}")]
    RepaymentExceedsDebt {
        /// Requested repayment
        amount: u128,
        /// Outstanding debt
        debt: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Liquidation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Closing this Trove would leave the system without any open Trove
    #[error("Cannot close the last active Trove")]
    LastTroveProtected,

    /// Offset larger than the stability pool can absorb
    #[error("Insufficient stability pool deposits: required {required}, available {available}")]
    InsufficientStabilityPool {
        /// Required deposit amount
        required: u128,
        /// Available deposit amount
        available: u128,
    },

    /// Redistribution requested while no stakes remain
    #[error("No active stakes to redistribute against")]
    NoStakesToRedistributeAgainst,

    // ═══════════════════════════════════════════════════════════════════
    // Registry Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Trove missing from the sorted registry
    #[error("Trove not in sorted registry: {0}")]
    NotInRegistry(String),

    /// Trove already present in the sorted registry
    #[error("Trove already in sorted registry: {0}")]
    AlreadyInRegistry(String),

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// No price has been set on the feed yet
    #[error("Price feed has no price")]
    PriceNotSet,

    /// Price outside the supported range
    #[error("Price {price} out of bounds (max {max})")]
    PriceOutOfBounds {
        /// Rejected price
        price: u128,
        /// Maximum supported price
        max: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Stability Pool Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Depositor has no deposit
    #[error("No stability pool deposit for {0}")]
    NoDeposit(String),

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    /// Division by zero
    #[error("Division by zero in {operation}")]
    DivisionByZero {
        /// Operation that divided by zero
        operation: String,
    },

    /// Engine parameters failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Returns true if this error is recoverable by adjusting the request
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientCollateral { .. }
                | Error::IcrBelowMcr { .. }
                | Error::DebtBelowMinimum { .. }
                | Error::RepaymentExceedsDebt { .. }
                | Error::ZeroAmount
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_)
                | Error::Overflow { .. }
                | Error::Underflow { .. }
                | Error::DivisionByZero { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Trove errors: 1xxx
            Error::TroveNotFound(_) => 1001,
            Error::TroveAlreadyExists(_) => 1002,
            Error::TroveNotActive(_) => 1003,
            Error::InsufficientCollateral { .. } => 1004,
            Error::IcrBelowMcr { .. } => 1005,
            Error::DebtBelowMinimum { .. } => 1006,
            Error::RepaymentExceedsDebt { .. } => 1007,

            // Liquidation errors: 2xxx
            Error::LastTroveProtected => 2001,
            Error::InsufficientStabilityPool { .. } => 2002,
            Error::NoStakesToRedistributeAgainst => 2003,

            // Registry errors: 3xxx
            Error::NotInRegistry(_) => 3001,
            Error::AlreadyInRegistry(_) => 3002,

            // Oracle errors: 4xxx
            Error::PriceNotSet => 4001,
            Error::PriceOutOfBounds { .. } => 4002,

            // Stability pool errors: 5xxx
            Error::NoDeposit(_) => 5001,

            // Validation errors: 6xxx
            Error::InvalidParameter { .. } => 6001,
            Error::ZeroAmount => 6002,
            Error::Overflow { .. } => 6003,
            Error::Underflow { .. } => 6004,
            Error::DivisionByZero { .. } => 6005,
            Error::InvalidConfiguration(_) => 6006,
            Error::InvariantViolation(_) => 6007,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,
        }
    }
}
