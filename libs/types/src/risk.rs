//! Risk limit configuration and check outcomes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-pair risk limits, configurable at engine construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum notional of a single order.
    pub max_order_notional: Decimal,
    /// Maximum quote-denominated volume per user per UTC day.
    pub max_daily_volume: Decimal,
    /// Maximum simultaneously open orders per user.
    pub max_open_orders: u32,
    /// Maximum projected position notional per user.
    pub max_position_notional: Decimal,
    /// Limit prices deviating less than this from the mark draw a warning.
    pub min_price_deviation: Decimal,
    /// Limit prices deviating more than this from the mark are rejected.
    pub max_price_deviation: Decimal,
    /// Orders arriving faster than this are refused.
    pub min_order_interval_ms: i64,
    /// Orders arriving faster than this draw a pacing warning.
    pub warn_order_interval_ms: i64,
    /// Buffer applied to the best-ask estimate when locking for market buys.
    pub slippage_buffer: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_notional: Decimal::from(1_000_000),
            max_daily_volume: Decimal::from(10_000_000),
            max_open_orders: 100,
            max_position_notional: Decimal::from(5_000_000),
            min_price_deviation: Decimal::new(1, 3), // 0.1%
            max_price_deviation: Decimal::new(1, 1), // 10%
            min_order_interval_ms: 1_000,
            warn_order_interval_ms: 5_000,
            slippage_buffer: Decimal::ZERO,
        }
    }
}

/// Non-fatal observations from a pre-trade check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskWarning {
    /// Limit price sits unusually close to the reference mark.
    PriceNearMark { deviation: Decimal },
    /// Orders are arriving faster than the advisory pacing interval.
    FastOrderPacing { elapsed_ms: i64 },
}

/// Successful pre-trade check, possibly with warnings attached.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskCheck {
    pub warnings: Vec<RiskWarning>,
}

impl RiskCheck {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn warn(mut self, warning: RiskWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}
