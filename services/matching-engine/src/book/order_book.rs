//! Per-pair order book
//!
//! Owns everything about one trading pair: the bid and ask ladders, the
//! registry of resting orders, and the market state derived from its
//! trades. Orders enter the registry only when they rest; cancel of an
//! already-filled order finds nothing.
//!
//! All mutation happens inside the pair's writer step, so the book itself
//! is plain owned data.

use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;
use types::errors::ValidationError;
use types::ids::{OrderId, Symbol, UserId};
use types::numeric::{notional, Price, Quantity};
use types::order::{Order, OrderType, Side};
use types::pair::TradingPair;

use super::ask_book::AskBook;
use super::bid_book::BidBook;
use crate::events::{MarketStats, Snapshot};

const NANOS_PER_24H: i64 = 86_400_000_000_000;

/// Last-trade state and a rolling 24h trade window.
#[derive(Debug, Clone, Default)]
pub struct MarketState {
    last_trade_price: Option<Price>,
    /// (timestamp, price, notional) per trade, pruned to the last 24h.
    window: VecDeque<(i64, Price, Decimal)>,
}

impl MarketState {
    /// Record a trade and prune entries older than 24h.
    pub fn record_trade(&mut self, price: Price, quantity: Quantity, timestamp: i64) {
        self.last_trade_price = Some(price);
        self.window
            .push_back((timestamp, price, notional(quantity, price)));
        let horizon = timestamp - NANOS_PER_24H;
        while self
            .window
            .front()
            .map(|(ts, _, _)| *ts <= horizon)
            .unwrap_or(false)
        {
            self.window.pop_front();
        }
    }

    pub fn last_trade_price(&self) -> Option<Price> {
        self.last_trade_price
    }

    /// Quote volume traded over the window.
    pub fn volume_24h(&self) -> Decimal {
        self.window.iter().map(|(_, _, value)| *value).sum()
    }

    /// Fractional price change across the window (0.05 = +5%).
    pub fn price_change_24h(&self) -> Decimal {
        match (self.window.front(), self.last_trade_price) {
            (Some((_, oldest, _)), Some(last)) if oldest != &last => {
                (last.as_decimal() - oldest.as_decimal()) / oldest.as_decimal()
            }
            _ => Decimal::ZERO,
        }
    }
}

/// One pair's book: ladders, resting-order registry, market state.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pair: TradingPair,
    bids: BidBook,
    asks: AskBook,
    orders: HashMap<OrderId, Order>,
    market: MarketState,
    /// Bumped on every change to the resting set; drives snapshot emission.
    version: u64,
}

impl OrderBook {
    pub fn new(pair: TradingPair) -> Self {
        Self {
            pair,
            bids: BidBook::new(),
            asks: AskBook::new(),
            orders: HashMap::new(),
            market: MarketState::default(),
            version: 0,
        }
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    pub fn symbol(&self) -> &Symbol {
        &self.pair.symbol
    }

    /// Book-level validation: pair active, quantity bounds and precision,
    /// limit price present and representable.
    pub fn validate_intent(
        &self,
        order_type: OrderType,
        price: Option<Price>,
        quantity: Quantity,
    ) -> Result<(), ValidationError> {
        if !self.pair.active {
            return Err(ValidationError::PairInactive {
                symbol: self.pair.symbol.to_string(),
            });
        }
        self.pair.validate_quantity(quantity)?;
        if order_type == OrderType::Limit {
            let price = price.ok_or(ValidationError::MissingPrice)?;
            self.pair.validate_price(price)?;
        }
        Ok(())
    }

    /// Put a residual order on its side of the book.
    pub fn rest_order(&mut self, order: Order) {
        match order.side {
            Side::Buy => self.bids.insert(&order),
            Side::Sell => self.asks.insert(&order),
        }
        self.orders.insert(order.order_id, order);
        self.version += 1;
    }

    /// A resting order by id.
    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// Number of resting orders.
    pub fn resting_count(&self) -> usize {
        self.orders.len()
    }

    /// Cancel a resting order: removed from ladder and registry, status set.
    /// Returns None for unknown (or already terminal, hence absent) ids.
    pub fn cancel(&mut self, order_id: &OrderId, timestamp: i64) -> Option<Order> {
        let mut order = self.take_resting(order_id)?;
        order.cancel(timestamp);
        Some(order)
    }

    /// Remove a resting order from ladder and registry without a status
    /// change (self-trade cancel-maker policy sets its own).
    pub fn take_resting(&mut self, order_id: &OrderId) -> Option<Order> {
        let order = self.orders.remove(order_id)?;
        let price = order
            .limit_price
            .expect("resting order carries a limit price");
        let removed = match order.side {
            Side::Buy => self.bids.remove(order_id, price),
            Side::Sell => self.asks.remove(order_id, price),
        };
        debug_assert!(removed, "registry and ladder disagree");
        self.version += 1;
        Some(order)
    }

    /// Apply a fill to the resting order at `(price, index)` on `side`.
    ///
    /// Updates the ladder entry and the registry order together; a fully
    /// filled order leaves both. Returns the order's state after the fill.
    pub fn fill_resting(
        &mut self,
        side: Side,
        price: Price,
        index: usize,
        order_id: &OrderId,
        quantity: Quantity,
        timestamp: i64,
    ) -> Option<Order> {
        let reduced = match side {
            Side::Buy => self
                .bids
                .level_mut(price)
                .map(|level| level.reduce_at(index, quantity))
                .unwrap_or(false),
            Side::Sell => self
                .asks
                .level_mut(price)
                .map(|level| level.reduce_at(index, quantity))
                .unwrap_or(false),
        };
        if !reduced {
            return None;
        }
        match side {
            Side::Buy => self.bids.prune_level(price),
            Side::Sell => self.asks.prune_level(price),
        }

        let order = self.orders.get_mut(order_id)?;
        order.apply_fill(price, quantity, timestamp);
        let snapshot = order.clone();
        if snapshot.is_filled() {
            self.orders.remove(order_id);
        }
        self.version += 1;
        Some(snapshot)
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    pub fn bids(&self) -> &BidBook {
        &self.bids
    }

    pub fn asks(&self) -> &AskBook {
        &self.asks
    }

    /// Next opposite-side price an incoming order would meet, walking from
    /// best to worse: strictly beyond `cursor`, or the best when None.
    pub fn next_opposite_price(&self, incoming_side: Side, cursor: Option<Price>) -> Option<Price> {
        match incoming_side {
            Side::Buy => self.asks.next_price_above(cursor),
            Side::Sell => self.bids.next_price_below(cursor),
        }
    }

    /// Entry at `(price, index)` on the given side's ladder, cloned out so
    /// the walk can keep borrowing the book mutably.
    pub fn level_entry(
        &self,
        side: Side,
        price: Price,
        index: usize,
    ) -> Option<crate::book::price_level::LevelEntry> {
        match side {
            Side::Buy => self.bids.entry_at(price, index).cloned(),
            Side::Sell => self.asks.entry_at(price, index).cloned(),
        }
    }

    /// Quantity the opposite side offers to an incoming order, at prices
    /// crossing `limit` (all prices for market orders), excluding the
    /// incoming user's own liquidity.
    pub fn fillable_against(
        &self,
        incoming_side: Side,
        limit: Option<Price>,
        exclude: Option<&UserId>,
    ) -> Quantity {
        match incoming_side {
            Side::Buy => self.asks.quantity_at_or_better(limit, exclude),
            Side::Sell => self.bids.quantity_at_or_better(limit, exclude),
        }
    }

    /// Record a trade into the market window.
    pub fn record_trade(&mut self, price: Price, quantity: Quantity, timestamp: i64) {
        self.market.record_trade(price, quantity, timestamp);
    }

    /// Reference price for risk bands: the last trade.
    pub fn mark_price(&self) -> Option<Price> {
        self.market.last_trade_price()
    }

    /// Aggregated top-`depth` snapshot of both sides.
    pub fn snapshot(&self, depth: usize, timestamp: i64) -> Snapshot {
        Snapshot {
            trading_pair: self.pair.symbol.clone(),
            bids: self.bids.top_levels(depth),
            asks: self.asks.top_levels(depth),
            timestamp,
        }
    }

    pub fn market_stats(&self) -> MarketStats {
        MarketStats {
            last_price: self.market.last_trade_price(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            volume_24h: self.market.volume_24h(),
            price_change_24h: self.market.price_change_24h(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::order::{OrderIntent, TimeInForce};

    const NOW: i64 = 1_708_123_456_789_000_000;

    fn btc_usdt() -> TradingPair {
        TradingPair::new(
            Symbol::new("BTC/USDT"),
            Quantity::from_str("0.001").unwrap(),
            Quantity::from_str("100").unwrap(),
            2,
            6,
        )
    }

    fn resting(side: Side, price: u64, qty: &str, seq: u64) -> Order {
        let intent = OrderIntent::limit(
            Symbol::new("BTC/USDT"),
            side,
            Price::from_u64(price),
            Quantity::from_str(qty).unwrap(),
            TimeInForce::Gtc,
        );
        let mut order = Order::accept(intent, seq, NOW);
        order.mark_open(NOW);
        order
    }

    #[test]
    fn test_validate_rejects_inactive_pair() {
        let mut pair = btc_usdt();
        pair.active = false;
        let book = OrderBook::new(pair);
        let result = book.validate_intent(
            OrderType::Limit,
            Some(Price::from_u64(50_000)),
            Quantity::from_str("1.0").unwrap(),
        );
        assert!(matches!(result, Err(ValidationError::PairInactive { .. })));
    }

    #[test]
    fn test_validate_requires_limit_price() {
        let book = OrderBook::new(btc_usdt());
        let result =
            book.validate_intent(OrderType::Limit, None, Quantity::from_str("1.0").unwrap());
        assert!(matches!(result, Err(ValidationError::MissingPrice)));

        // Market orders carry no price by design.
        assert!(book
            .validate_intent(OrderType::Market, None, Quantity::from_str("1.0").unwrap())
            .is_ok());
    }

    #[test]
    fn test_rest_and_cancel_roundtrip() {
        let mut book = OrderBook::new(btc_usdt());
        let order = resting(Side::Buy, 50_000, "1.0", 1);
        let id = order.order_id;
        book.rest_order(order);

        assert_eq!(book.best_bid(), Some(Price::from_u64(50_000)));
        assert_eq!(book.resting_count(), 1);

        let cancelled = book.cancel(&id, NOW + 1).unwrap();
        assert_eq!(cancelled.status, types::order::OrderStatus::Cancelled);
        assert!(book.best_bid().is_none());
        assert_eq!(book.resting_count(), 0);

        // A second cancel finds nothing.
        assert!(book.cancel(&id, NOW + 2).is_none());
    }

    #[test]
    fn test_fill_resting_partial_then_full() {
        let mut book = OrderBook::new(btc_usdt());
        let order = resting(Side::Sell, 50_500, "1.0", 1);
        let id = order.order_id;
        book.rest_order(order);

        let after = book
            .fill_resting(
                Side::Sell,
                Price::from_u64(50_500),
                0,
                &id,
                Quantity::from_str("0.4").unwrap(),
                NOW + 1,
            )
            .unwrap();
        assert_eq!(after.status, types::order::OrderStatus::PartiallyFilled);
        assert_eq!(
            after.remaining_quantity,
            Quantity::from_str("0.6").unwrap()
        );
        assert_eq!(book.resting_count(), 1);

        let done = book
            .fill_resting(
                Side::Sell,
                Price::from_u64(50_500),
                0,
                &id,
                Quantity::from_str("0.6").unwrap(),
                NOW + 2,
            )
            .unwrap();
        assert_eq!(done.status, types::order::OrderStatus::Filled);
        assert_eq!(book.resting_count(), 0);
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn test_version_tracks_resting_set() {
        let mut book = OrderBook::new(btc_usdt());
        let v0 = book.version();
        let order = resting(Side::Buy, 50_000, "1.0", 1);
        let id = order.order_id;
        book.rest_order(order);
        assert!(book.version() > v0);

        let v1 = book.version();
        book.cancel(&id, NOW + 1);
        assert!(book.version() > v1);
    }

    #[test]
    fn test_snapshot_aggregates_levels() {
        let mut book = OrderBook::new(btc_usdt());
        book.rest_order(resting(Side::Buy, 50_000, "1.0", 1));
        book.rest_order(resting(Side::Buy, 50_000, "0.5", 2));
        book.rest_order(resting(Side::Sell, 50_500, "2.0", 3));

        let snap = book.snapshot(20, NOW);
        assert_eq!(snap.bids.len(), 1);
        assert_eq!(snap.bids[0].quantity, Decimal::from_str_exact("1.5").unwrap());
        assert_eq!(snap.bids[0].order_count, 2);
        assert_eq!(snap.asks.len(), 1);
    }

    #[test]
    fn test_market_state_window() {
        let mut state = MarketState::default();
        state.record_trade(Price::from_u64(50_000), Quantity::from_str("1.0").unwrap(), NOW);
        state.record_trade(
            Price::from_u64(51_000),
            Quantity::from_str("0.5").unwrap(),
            NOW + 1_000,
        );

        assert_eq!(state.last_trade_price(), Some(Price::from_u64(51_000)));
        assert_eq!(state.volume_24h(), Decimal::from(75_500));
        assert_eq!(
            state.price_change_24h(),
            Decimal::from_str_exact("0.02").unwrap()
        );
    }

    #[test]
    fn test_market_window_prunes_old_trades() {
        let mut state = MarketState::default();
        state.record_trade(Price::from_u64(40_000), Quantity::from_str("1.0").unwrap(), NOW);
        state.record_trade(
            Price::from_u64(50_000),
            Quantity::from_str("1.0").unwrap(),
            NOW + NANOS_PER_24H + 1,
        );

        // The first trade aged out of the window.
        assert_eq!(state.volume_24h(), Decimal::from(50_000));
        assert_eq!(state.price_change_24h(), Decimal::ZERO);
    }

    #[test]
    fn test_fillable_against_excludes_own_liquidity() {
        let mut book = OrderBook::new(btc_usdt());
        let mut own = resting(Side::Sell, 50_500, "1.0", 1);
        own.user_id = Some(UserId::new("alice"));
        let mut other = resting(Side::Sell, 50_600, "2.0", 2);
        other.user_id = Some(UserId::new("bob"));
        book.rest_order(own);
        book.rest_order(other);

        let fillable = book.fillable_against(
            Side::Buy,
            Some(Price::from_u64(50_600)),
            Some(&UserId::new("alice")),
        );
        assert_eq!(fillable, Quantity::from_str("2.0").unwrap());
    }
}
