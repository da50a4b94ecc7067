//! Fee schedule
//!
//! Flat taker/maker rate with a multiplicative VIP discount. The rate is
//! runtime-tunable through the engine's admin surface but always bounded to
//! [0, 0.01].

use crate::ids::UserId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Upper bound on the flat fee rate (1%).
pub const MAX_FEE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeeError {
    #[error("fee rate {got} outside [0, {max}]", max = MAX_FEE_RATE)]
    RateOutOfRange { got: Decimal },

    #[error("vip discount {got} outside [0, 1]")]
    DiscountOutOfRange { got: Decimal },
}

/// Flat fee schedule with a VIP discount set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    rate: Decimal,
    /// Multiplied into the rate for VIP-tagged users (default 0.5).
    vip_discount: Decimal,
    vip_users: HashSet<UserId>,
}

impl FeeSchedule {
    /// Create a schedule with the given flat rate and the default 50% VIP
    /// discount.
    pub fn new(rate: Decimal) -> Result<Self, FeeError> {
        if rate < Decimal::ZERO || rate > MAX_FEE_RATE {
            return Err(FeeError::RateOutOfRange { got: rate });
        }
        Ok(Self {
            rate,
            vip_discount: Decimal::new(5, 1),
            vip_users: HashSet::new(),
        })
    }

    /// Zero-fee schedule.
    pub fn free() -> Self {
        Self {
            rate: Decimal::ZERO,
            vip_discount: Decimal::new(5, 1),
            vip_users: HashSet::new(),
        }
    }

    /// Replace the flat rate at runtime.
    pub fn set_rate(&mut self, rate: Decimal) -> Result<(), FeeError> {
        if rate < Decimal::ZERO || rate > MAX_FEE_RATE {
            return Err(FeeError::RateOutOfRange { got: rate });
        }
        self.rate = rate;
        Ok(())
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// Replace the VIP discount factor.
    pub fn set_vip_discount(&mut self, discount: Decimal) -> Result<(), FeeError> {
        if discount < Decimal::ZERO || discount > Decimal::ONE {
            return Err(FeeError::DiscountOutOfRange { got: discount });
        }
        self.vip_discount = discount;
        Ok(())
    }

    /// Tag a user as VIP.
    pub fn add_vip(&mut self, user: UserId) {
        self.vip_users.insert(user);
    }

    /// Effective rate for a (possibly anonymous) user.
    pub fn rate_for(&self, user: Option<&UserId>) -> Decimal {
        match user {
            Some(u) if self.vip_users.contains(u) => self.rate * self.vip_discount,
            _ => self.rate,
        }
    }

    /// Fee charged on a fill leg: notional × effective rate.
    pub fn fee_for(&self, notional: Decimal, user: Option<&UserId>) -> Decimal {
        notional * self.rate_for(user)
    }
}
