//! Fund-lock records
//!
//! One record per admitted order, tracking how much of the original
//! reservation is still held. Settlement draws the lock down fill by fill;
//! cancellation and terminal states release whatever remains.

use rust_decimal::Decimal;
use types::ids::{OrderId, Symbol, UserId};
use types::order::Side;

/// The asset a lock reserves, determined by the order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockedAsset {
    /// Sell orders reserve base.
    Base,
    /// Buy orders reserve quote.
    Quote,
}

impl LockedAsset {
    pub fn for_side(side: Side) -> Self {
        match side {
            Side::Buy => LockedAsset::Quote,
            Side::Sell => LockedAsset::Base,
        }
    }
}

/// Remaining reservation held against one order.
#[derive(Debug, Clone)]
pub struct OrderLock {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub asset: LockedAsset,
    pub remaining: Decimal,
}

impl OrderLock {
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        amount: Decimal,
    ) -> Self {
        Self {
            order_id,
            user_id,
            symbol,
            asset: LockedAsset::for_side(side),
            remaining: amount,
        }
    }

    /// Draw up to `amount` from the lock; returns how much was covered.
    /// Anything not covered must come from the user's available balance.
    pub fn draw(&mut self, amount: Decimal) -> Decimal {
        let covered = amount.min(self.remaining);
        self.remaining -= covered;
        covered
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_lock(amount: u64) -> OrderLock {
        OrderLock::new(
            OrderId::new(),
            UserId::new("alice"),
            Symbol::new("BTC/USDT"),
            Side::Buy,
            Decimal::from(amount),
        )
    }

    #[test]
    fn test_asset_follows_side() {
        assert_eq!(LockedAsset::for_side(Side::Buy), LockedAsset::Quote);
        assert_eq!(LockedAsset::for_side(Side::Sell), LockedAsset::Base);
    }

    #[test]
    fn test_draw_within_lock() {
        let mut lock = make_lock(10_000);
        let covered = lock.draw(Decimal::from(4_000));
        assert_eq!(covered, Decimal::from(4_000));
        assert_eq!(lock.remaining, Decimal::from(6_000));
        assert!(!lock.is_exhausted());
    }

    #[test]
    fn test_draw_beyond_lock_caps_at_remaining() {
        let mut lock = make_lock(1_000);
        let covered = lock.draw(Decimal::from(1_500));
        assert_eq!(covered, Decimal::from(1_000));
        assert!(lock.is_exhausted());
    }
}
