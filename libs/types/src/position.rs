//! Per-user, per-pair position state
//!
//! Four balance buckets (base/quote × available/locked) plus the counters
//! the risk gate reads: daily traded volume, open order count, and the time
//! of the last accepted order. Every mutation keeps all fields non-negative;
//! a shortfall surfaces as a `FundsError` instead of silently clamping.
//!
//! Conservation: available + locked per asset only changes through explicit
//! credits and debits (deposits, fill settlement, fees).

use crate::errors::FundsError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const NANOS_PER_DAY: i64 = 86_400_000_000_000;

/// Position of one user on one trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPosition {
    pub base_balance: Decimal,
    pub quote_balance: Decimal,
    pub locked_base: Decimal,
    pub locked_quote: Decimal,
    /// Quote-denominated volume traded in the current UTC day.
    pub daily_volume: Decimal,
    pub open_order_count: u32,
    /// Unix nanos of the last accepted order or fill; 0 when untouched.
    pub last_order_time: i64,
    /// UTC day index the daily_volume belongs to.
    volume_day: i64,
}

impl UserPosition {
    /// Empty position.
    pub fn new() -> Self {
        Self {
            base_balance: Decimal::ZERO,
            quote_balance: Decimal::ZERO,
            locked_base: Decimal::ZERO,
            locked_quote: Decimal::ZERO,
            daily_volume: Decimal::ZERO,
            open_order_count: 0,
            last_order_time: 0,
            volume_day: 0,
        }
    }

    /// Position funded with initial balances.
    pub fn with_balances(base: Decimal, quote: Decimal) -> Self {
        let mut p = Self::new();
        p.base_balance = base;
        p.quote_balance = quote;
        p
    }

    pub fn deposit_base(&mut self, amount: Decimal) {
        self.base_balance += amount;
    }

    pub fn deposit_quote(&mut self, amount: Decimal) {
        self.quote_balance += amount;
    }

    /// Total base held: available + locked.
    pub fn total_base(&self) -> Decimal {
        self.base_balance + self.locked_base
    }

    /// Total quote held: available + locked.
    pub fn total_quote(&self) -> Decimal {
        self.quote_balance + self.locked_quote
    }

    /// Reserve base against an open sell order.
    pub fn lock_base(&mut self, amount: Decimal) -> Result<(), FundsError> {
        if amount > self.base_balance {
            return Err(FundsError::AvailableShortfall {
                asset: "base".to_string(),
                required: amount,
                available: self.base_balance,
            });
        }
        self.base_balance -= amount;
        self.locked_base += amount;
        Ok(())
    }

    /// Reserve quote against an open buy order.
    pub fn lock_quote(&mut self, amount: Decimal) -> Result<(), FundsError> {
        if amount > self.quote_balance {
            return Err(FundsError::AvailableShortfall {
                asset: "quote".to_string(),
                required: amount,
                available: self.quote_balance,
            });
        }
        self.quote_balance -= amount;
        self.locked_quote += amount;
        Ok(())
    }

    /// Return reserved base to the available balance.
    pub fn unlock_base(&mut self, amount: Decimal) -> Result<(), FundsError> {
        if amount > self.locked_base {
            return Err(FundsError::LockShortfall {
                asset: "base".to_string(),
                required: amount,
                locked: self.locked_base,
            });
        }
        self.locked_base -= amount;
        self.base_balance += amount;
        Ok(())
    }

    /// Return reserved quote to the available balance.
    pub fn unlock_quote(&mut self, amount: Decimal) -> Result<(), FundsError> {
        if amount > self.locked_quote {
            return Err(FundsError::LockShortfall {
                asset: "quote".to_string(),
                required: amount,
                locked: self.locked_quote,
            });
        }
        self.locked_quote -= amount;
        self.quote_balance += amount;
        Ok(())
    }

    /// Spend reserved base out of the position (seller delivering).
    pub fn spend_locked_base(&mut self, amount: Decimal) -> Result<(), FundsError> {
        if amount > self.locked_base {
            return Err(FundsError::LockShortfall {
                asset: "base".to_string(),
                required: amount,
                locked: self.locked_base,
            });
        }
        self.locked_base -= amount;
        Ok(())
    }

    /// Spend reserved quote out of the position (buyer paying).
    pub fn spend_locked_quote(&mut self, amount: Decimal) -> Result<(), FundsError> {
        if amount > self.locked_quote {
            return Err(FundsError::LockShortfall {
                asset: "quote".to_string(),
                required: amount,
                locked: self.locked_quote,
            });
        }
        self.locked_quote -= amount;
        Ok(())
    }

    /// Debit available quote (fee settlement).
    pub fn debit_quote(&mut self, amount: Decimal) -> Result<(), FundsError> {
        if amount > self.quote_balance {
            return Err(FundsError::AvailableShortfall {
                asset: "quote".to_string(),
                required: amount,
                available: self.quote_balance,
            });
        }
        self.quote_balance -= amount;
        Ok(())
    }

    pub fn credit_base(&mut self, amount: Decimal) {
        self.base_balance += amount;
    }

    pub fn credit_quote(&mut self, amount: Decimal) {
        self.quote_balance += amount;
    }

    /// Accumulate traded notional into the daily window, resetting when the
    /// UTC day of `timestamp` differs from the window's day.
    pub fn record_volume(&mut self, notional: Decimal, timestamp: i64) {
        let day = timestamp / NANOS_PER_DAY;
        if day != self.volume_day {
            self.daily_volume = Decimal::ZERO;
            self.volume_day = day;
        }
        self.daily_volume += notional;
        self.last_order_time = timestamp;
    }

    /// Daily volume as of `timestamp` (zero once the day rolls over).
    pub fn daily_volume_at(&self, timestamp: i64) -> Decimal {
        if timestamp / NANOS_PER_DAY != self.volume_day {
            Decimal::ZERO
        } else {
            self.daily_volume
        }
    }

    /// Record an accepted order for rate limiting.
    pub fn touch(&mut self, timestamp: i64) {
        self.last_order_time = timestamp;
    }

    pub fn inc_open_orders(&mut self) {
        self.open_order_count += 1;
    }

    pub fn dec_open_orders(&mut self) {
        self.open_order_count = self.open_order_count.saturating_sub(1);
    }
}

impl Default for UserPosition {
    fn default() -> Self {
        Self::new()
    }
}
