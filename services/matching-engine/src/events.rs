//! Event taxonomy and channel addressing
//!
//! All engine output is one closed sum type, serialized by a single encoder
//! and routed by structured channel addresses. Consumers never parse
//! concatenated channel strings; the `(kind, scope)` pair is the address.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use types::ids::{Symbol, UserId};
use types::numeric::Price;
use types::order::Order;
use types::trade::Fill;

use crate::delta::BookDelta;

/// One aggregated price level in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: Decimal,
    pub order_count: u32,
}

/// Aggregated top-of-book view, both sides, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub trading_pair: Symbol,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
    pub timestamp: i64,
}

/// Per-pair market statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub last_price: Option<Price>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub volume_24h: Decimal,
    pub price_change_24h: Decimal,
}

/// Everything the engine publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Event {
    Trade(Fill),
    OrderUpdate(Order),
    OrderbookSnapshot(Snapshot),
    OrderbookDelta(BookDelta),
}

impl Event {
    /// Stable label used for journaling and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Trade(_) => "trade",
            Event::OrderUpdate(_) => "order_update",
            Event::OrderbookSnapshot(_) => "orderbook",
            Event::OrderbookDelta(_) => "orderbook_delta",
        }
    }

    /// Engine-assigned timestamp carried by the payload.
    pub fn timestamp(&self) -> i64 {
        match self {
            Event::Trade(fill) => fill.timestamp,
            Event::OrderUpdate(order) => order.updated_at,
            Event::OrderbookSnapshot(snapshot) => snapshot.timestamp,
            Event::OrderbookDelta(delta) => delta.timestamp,
        }
    }
}

/// Structured channel address: what kind of stream, scoped to what.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Channel {
    /// Fills for one pair.
    Trade { symbol: Symbol },
    /// Snapshots and deltas for one pair.
    Orderbook { symbol: Symbol },
    /// Lifecycle updates for one user's orders.
    OrderUpdate { user: UserId },
    /// Every fill on the venue.
    TradesAll,
    /// Every order update on the venue.
    OrdersAll,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Trade { symbol } => write!(f, "trade.{}", symbol),
            Channel::Orderbook { symbol } => write!(f, "orderbook.{}", symbol),
            Channel::OrderUpdate { user } => write!(f, "order-update.{}", user),
            Channel::TradesAll => write!(f, "trades.all"),
            Channel::OrdersAll => write!(f, "orders.all"),
        }
    }
}

/// Channels an event is published to.
///
/// Trades go to their pair's channel (never anything derived from an order
/// id) plus the aggregate stream; order updates go to their owner when one
/// exists, plus the aggregate stream.
pub fn channels_for(event: &Event) -> Vec<Channel> {
    match event {
        Event::Trade(fill) => vec![
            Channel::Trade {
                symbol: fill.trading_pair.clone(),
            },
            Channel::TradesAll,
        ],
        Event::OrderUpdate(order) => {
            let mut channels = Vec::with_capacity(2);
            if let Some(user) = &order.user_id {
                channels.push(Channel::OrderUpdate { user: user.clone() });
            }
            channels.push(Channel::OrdersAll);
            channels
        }
        Event::OrderbookSnapshot(snapshot) => vec![Channel::Orderbook {
            symbol: snapshot.trading_pair.clone(),
        }],
        Event::OrderbookDelta(delta) => vec![Channel::Orderbook {
            symbol: delta.trading_pair.clone(),
        }],
    }
}
