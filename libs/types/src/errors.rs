//! Error taxonomy for the engine
//!
//! Split by when the failure is detected: validation before admission, risk
//! rejection before locking, time-in-force failures after the match walk,
//! transient collaborator failures inside a writer step, and invariant
//! violations that quarantine a pair.

use crate::numeric::Quantity;
use rust_decimal::Decimal;
use thiserror::Error;

/// Malformed or impossible intent. Nothing was admitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unknown trading pair: {symbol}")]
    UnknownPair { symbol: String },

    #[error("trading pair is not active: {symbol}")]
    PairInactive { symbol: String },

    #[error("limit order requires a price")]
    MissingPrice,

    #[error("quantity {got} outside [{min}, {max}]")]
    QuantityOutOfBounds {
        min: Quantity,
        max: Quantity,
        got: Quantity,
    },

    #[error("{field} exceeds pair precision of {decimals} decimals")]
    PrecisionExceeded {
        field: &'static str,
        decimals: u32,
    },
}

/// Pre-trade risk check failure. No lock, no sequence number, no event.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("order notional {got} exceeds per-order limit {limit}")]
    OrderNotionalTooLarge { limit: Decimal, got: Decimal },

    #[error("projected position notional {projected} exceeds limit {limit}")]
    PositionLimitExceeded { limit: Decimal, projected: Decimal },

    #[error("projected daily volume {projected} exceeds limit {limit}")]
    DailyVolumeExceeded { limit: Decimal, projected: Decimal },

    #[error("open order count at cap of {limit}")]
    OpenOrderCapExceeded { limit: u32 },

    #[error("price deviates {deviation} from reference, above limit {limit}")]
    PriceOutOfBand { deviation: Decimal, limit: Decimal },

    #[error("order arrived {elapsed_ms}ms after the last, minimum interval {required_ms}ms")]
    RateLimited { elapsed_ms: i64, required_ms: i64 },
}

/// Fund-lock accounting failure. A shortfall here after a passing pre-trade
/// check means state corruption, and callers escalate it to a quarantine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FundsError {
    #[error("insufficient available {asset}: required {required}, available {available}")]
    AvailableShortfall {
        asset: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient locked {asset}: required {required}, locked {locked}")]
    LockShortfall {
        asset: String,
        required: Decimal,
        locked: Decimal,
    },

    #[error("no fund lock recorded for order {order_id}")]
    UnknownLock { order_id: String },
}

/// Top-level engine error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("risk check failed: {0}")]
    Risk(#[from] RiskError),

    #[error("unfulfillable time-in-force: {reason}")]
    UnfulfillableTif { reason: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("transient failure: {reason}")]
    Transient { reason: String },

    #[error("pair {symbol} is degraded and refusing intents")]
    Degraded { symbol: String },

    #[error("invariant violation: {context}")]
    Invariant { context: String },
}

impl From<FundsError> for EngineError {
    fn from(err: FundsError) -> Self {
        EngineError::Invariant {
            context: err.to_string(),
        }
    }
}
