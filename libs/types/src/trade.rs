//! Trade records
//!
//! A `Fill` is the immutable record of one match. Buyer/seller framing is
//! used throughout (rather than maker/taker) because settlement is
//! side-symmetric: the buyer receives base, the seller receives quote, and
//! each pays their own fee.

use crate::ids::{OrderId, Symbol, TradeId, UserId};
use crate::numeric::{notional, Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How completely each side was filled by this match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Both orders fully filled.
    Full,
    /// Buyer has remaining quantity after the match.
    PartialBuyer,
    /// Seller has remaining quantity after the match.
    PartialSeller,
    /// Both orders have remaining quantity.
    PartialBoth,
}

impl MatchType {
    /// Classify from the post-fill remainders of both orders.
    pub fn from_remainders(buyer_remaining: Quantity, seller_remaining: Quantity) -> Self {
        match (buyer_remaining.is_zero(), seller_remaining.is_zero()) {
            (true, true) => MatchType::Full,
            (false, true) => MatchType::PartialBuyer,
            (true, false) => MatchType::PartialSeller,
            (false, false) => MatchType::PartialBoth,
        }
    }
}

/// Immutable record of one executed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub trade_id: TradeId,
    pub trading_pair: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    pub buyer_order_id: OrderId,
    pub seller_order_id: OrderId,
    pub buyer_user_id: Option<UserId>,
    pub seller_user_id: Option<UserId>,
    pub buyer_fee: Decimal,
    pub seller_fee: Decimal,
    pub timestamp: i64,
    pub match_type: MatchType,
}

impl Fill {
    /// Quote value of the fill: quantity × price.
    pub fn notional(&self) -> Decimal {
        notional(self.quantity, self.price)
    }

    /// Both user ids present and distinct, or at least one anonymous.
    pub fn is_self_trade(&self) -> bool {
        match (&self.buyer_user_id, &self.seller_user_id) {
            (Some(b), Some(s)) => b == s,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fill(buyer: &str, seller: &str) -> Fill {
        Fill {
            trade_id: TradeId::from_parts(1_708_123_456_789_000_000, 1),
            trading_pair: Symbol::new("BTC/USDT"),
            price: Price::from_u64(50_000),
            quantity: Quantity::from_str("0.5").unwrap(),
            buyer_order_id: OrderId::new(),
            seller_order_id: OrderId::new(),
            buyer_user_id: Some(UserId::new(buyer)),
            seller_user_id: Some(UserId::new(seller)),
            buyer_fee: Decimal::from(25),
            seller_fee: Decimal::from(25),
            timestamp: 1_708_123_456_789_000_000,
            match_type: MatchType::Full,
        }
    }

    #[test]
    fn test_fill_notional() {
        let fill = make_fill("alice", "bob");
        assert_eq!(fill.notional(), Decimal::from(25_000));
    }

    #[test]
    fn test_self_trade_detection() {
        assert!(!make_fill("alice", "bob").is_self_trade());
        assert!(make_fill("alice", "alice").is_self_trade());

        let mut anon = make_fill("alice", "bob");
        anon.buyer_user_id = None;
        anon.seller_user_id = None;
        assert!(!anon.is_self_trade());
    }

    #[test]
    fn test_match_type_classification() {
        let zero = Quantity::zero();
        let some = Quantity::from_str("0.1").unwrap();
        assert_eq!(MatchType::from_remainders(zero, zero), MatchType::Full);
        assert_eq!(MatchType::from_remainders(some, zero), MatchType::PartialBuyer);
        assert_eq!(MatchType::from_remainders(zero, some), MatchType::PartialSeller);
        assert_eq!(MatchType::from_remainders(some, some), MatchType::PartialBoth);
    }

    #[test]
    fn test_fill_serialization_roundtrip() {
        let fill = make_fill("alice", "bob");
        let json = serde_json::to_string(&fill).unwrap();
        let back: Fill = serde_json::from_str(&json).unwrap();
        assert_eq!(fill, back);
    }
}
