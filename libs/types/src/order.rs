//! Order lifecycle types
//!
//! An order enters as an `OrderIntent`, becomes an `Order` at acceptance
//! (when its per-pair sequence number is assigned), and then moves through
//! the status machine:
//!
//! `pending → rejected | open | partially_filled | filled | cancelled`,
//! with `open → partially_filled → filled` and cancellation valid from any
//! non-terminal state. `filled`, `rejected`, `cancelled` are terminal.

use crate::ids::{OrderId, Symbol, UserId};
use crate::numeric::{notional, Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// Time-in-force policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good-Till-Cancel: residual rests on the book.
    #[default]
    Gtc,
    /// Immediate-Or-Cancel: match what crosses, discard the rest.
    Ioc,
    /// Fill-Or-Kill: full match or reject with zero side effects.
    Fok,
}

impl TimeInForce {
    /// Whether a residual under this policy may rest on the book.
    pub fn can_rest(&self) -> bool {
        matches!(self, TimeInForce::Gtc)
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Admitted, not yet through matching.
    Pending,
    /// Resting with no fills.
    Open,
    /// Some quantity executed, some remaining.
    PartiallyFilled,
    /// Fully executed (terminal).
    Filled,
    /// Removed by the user or by policy (terminal).
    Cancelled,
    /// Refused by validation, risk, or time-in-force (terminal).
    Rejected,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// A validated order intent as handed to the engine by the ingress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub trading_pair: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Required for limit orders; absent for market orders.
    #[serde(default)]
    pub price: Option<Price>,
    pub quantity: Quantity,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl OrderIntent {
    /// Convenience constructor for a limit order.
    pub fn limit(
        trading_pair: Symbol,
        side: Side,
        price: Price,
        quantity: Quantity,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            trading_pair,
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            quantity,
            time_in_force,
            user_id: None,
        }
    }

    /// Convenience constructor for a market order (IOC by default).
    pub fn market(trading_pair: Symbol, side: Side, quantity: Quantity) -> Self {
        Self {
            trading_pair,
            side,
            order_type: OrderType::Market,
            price: None,
            quantity,
            time_in_force: TimeInForce::Ioc,
            user_id: None,
        }
    }

    /// Attach a user id.
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// A live order, owned by its pair's book while resting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    pub trading_pair: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    /// Present for limit orders, absent for market orders.
    pub limit_price: Option<Price>,
    pub original_quantity: Quantity,
    pub filled_quantity: Quantity,
    pub remaining_quantity: Quantity,
    /// Σ(fill_price × fill_qty) / filled_quantity, absent before any fill.
    pub average_fill_price: Option<Price>,
    /// Quote value executed so far; keeps the average exact across fills.
    pub filled_value: Decimal,
    pub status: OrderStatus,
    /// Monotone per pair, assigned at acceptance.
    pub sequence: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Build an accepted order from an intent, with its sequence assigned.
    pub fn accept(intent: OrderIntent, sequence: u64, timestamp: i64) -> Self {
        Self {
            order_id: OrderId::new(),
            user_id: intent.user_id,
            trading_pair: intent.trading_pair,
            side: intent.side,
            order_type: intent.order_type,
            time_in_force: intent.time_in_force,
            limit_price: intent.price,
            original_quantity: intent.quantity,
            filled_quantity: Quantity::zero(),
            remaining_quantity: intent.quantity,
            average_fill_price: None,
            filled_value: Decimal::ZERO,
            status: OrderStatus::Pending,
            sequence,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// filled + remaining = original.
    pub fn check_invariant(&self) -> bool {
        self.filled_quantity.as_decimal() + self.remaining_quantity.as_decimal()
            == self.original_quantity.as_decimal()
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero() && !self.original_quantity.is_zero()
    }

    pub fn has_fills(&self) -> bool {
        !self.filled_quantity.is_zero()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one fill at the given price.
    ///
    /// Updates filled/remaining quantities, the running average price, and
    /// the status (`PartiallyFilled` or `Filled`).
    ///
    /// # Panics
    /// Panics if the fill exceeds the remaining quantity; the executor
    /// re-validates quantities before applying.
    pub fn apply_fill(&mut self, price: Price, quantity: Quantity, timestamp: i64) {
        assert!(
            quantity <= self.remaining_quantity,
            "fill exceeds remaining quantity"
        );

        self.filled_quantity = self.filled_quantity + quantity;
        self.remaining_quantity = self.remaining_quantity - quantity;
        self.filled_value += notional(quantity, price);
        self.average_fill_price =
            Price::try_new(self.filled_value / self.filled_quantity.as_decimal());

        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = timestamp;

        debug_assert!(self.check_invariant());
    }

    /// Mark a zero-execution residual as resting.
    pub fn mark_open(&mut self, timestamp: i64) {
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::Open;
            self.updated_at = timestamp;
        }
    }

    /// Cancel a non-terminal order. Returns false when already terminal.
    pub fn cancel(&mut self, timestamp: i64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = timestamp;
        true
    }

    /// Reject the order (validation, risk, or TIF failure).
    pub fn reject(&mut self, timestamp: i64) {
        self.status = OrderStatus::Rejected;
        self.updated_at = timestamp;
    }
}
