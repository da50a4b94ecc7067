//! Per-pair risk limit registry

use std::collections::HashMap;
use types::ids::Symbol;
use types::risk::RiskLimits;

/// Holds the default limits plus per-pair overrides.
#[derive(Debug, Clone, Default)]
pub struct LimitsRegistry {
    default: RiskLimits,
    per_pair: HashMap<Symbol, RiskLimits>,
}

impl LimitsRegistry {
    pub fn new(default: RiskLimits) -> Self {
        Self {
            default,
            per_pair: HashMap::new(),
        }
    }

    /// Install an override for one pair.
    pub fn set(&mut self, symbol: Symbol, limits: RiskLimits) {
        self.per_pair.insert(symbol, limits);
    }

    /// Limits in effect for a pair.
    pub fn for_pair(&self, symbol: &Symbol) -> &RiskLimits {
        self.per_pair.get(symbol).unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_override_wins_over_default() {
        let mut registry = LimitsRegistry::default();
        let btc = Symbol::new("BTC/USDT");
        let eth = Symbol::new("ETH/USDT");

        let tight = RiskLimits {
            max_open_orders: 5,
            ..RiskLimits::default()
        };
        registry.set(btc.clone(), tight);

        assert_eq!(registry.for_pair(&btc).max_open_orders, 5);
        assert_eq!(
            registry.for_pair(&eth).max_open_orders,
            RiskLimits::default().max_open_orders
        );
        assert_eq!(
            registry.for_pair(&eth).max_daily_volume,
            Decimal::from(10_000_000)
        );
    }
}
