//! Trade execution
//!
//! Finalizes one match as an atomic step: re-validate, price the fees,
//! write the trade to the ledger, then mutate both orders and settle both
//! positions. The ledger write is the only fallible external call and it
//! happens first — a failed step therefore leaves no partial state behind,
//! and the idempotent trade id makes the retries safe.

use std::sync::atomic::{AtomicU64, Ordering};

use ledger::TradeStore;
use risk_engine::RiskGate;
use tracing::warn;
use types::errors::EngineError;
use types::fee::FeeSchedule;
use types::ids::{OrderId, TradeId};
use types::numeric::{notional, Price, Quantity};
use types::order::{Order, Side};
use types::trade::{Fill, MatchType};

use crate::book::OrderBook;
use crate::events::Event;
use crate::matching::crossing;

/// Per-step execution context: fee schedule, risk gate, ledger, and the
/// engine-global trade counter.
pub struct TradeExecutor<'a> {
    fees: &'a FeeSchedule,
    gate: &'a RiskGate,
    store: &'a dyn TradeStore,
    trade_seq: &'a AtomicU64,
    retry_limit: u32,
}

impl<'a> TradeExecutor<'a> {
    pub fn new(
        fees: &'a FeeSchedule,
        gate: &'a RiskGate,
        store: &'a dyn TradeStore,
        trade_seq: &'a AtomicU64,
        retry_limit: u32,
    ) -> Self {
        Self {
            fees,
            gate,
            store,
            trade_seq,
            retry_limit,
        }
    }

    /// Execute one fill between the incoming order and the resting order at
    /// `(price, index)` on the maker side. Stages the trade event and the
    /// maker's order-update event.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_fill(
        &self,
        book: &mut OrderBook,
        incoming: &mut Order,
        maker_order_id: OrderId,
        price: Price,
        index: usize,
        quantity: Quantity,
        timestamp: i64,
        events: &mut Vec<Event>,
    ) -> Result<Fill, EngineError> {
        let maker = book.order(&maker_order_id).ok_or(EngineError::Invariant {
            context: format!("maker {} missing from registry", maker_order_id),
        })?;

        // Re-validate the match before anything is written.
        self.validate_match(incoming, maker, price, quantity)?;

        let maker_side = maker.side;
        let fill = self.build_fill(incoming, maker, price, quantity, timestamp);

        // Ledger first. Bounded retries; persistent failure aborts the step
        // with every order and position untouched.
        self.store_with_retry(&fill)?;

        incoming.apply_fill(price, quantity, timestamp);
        let maker_after = book
            .fill_resting(maker_side, price, index, &maker_order_id, quantity, timestamp)
            .ok_or(EngineError::Invariant {
                context: format!("ladder entry for maker {} disagrees with registry", maker_order_id),
            })?;

        self.gate.settle_fill(&fill)?;
        if maker_after.is_filled() && maker_after.user_id.is_some() {
            // Surplus release and open-order accounting at terminal state.
            self.gate.release(&maker_order_id)?;
        }

        book.record_trade(price, quantity, timestamp);

        events.push(Event::Trade(fill.clone()));
        events.push(Event::OrderUpdate(maker_after));
        Ok(fill)
    }

    /// Release an order's fund lock, escalating accounting failures.
    pub fn release_lock(&self, order_id: &OrderId) -> Result<(), EngineError> {
        self.gate.release(order_id)?;
        Ok(())
    }

    fn validate_match(
        &self,
        incoming: &Order,
        maker: &Order,
        price: Price,
        quantity: Quantity,
    ) -> Result<(), EngineError> {
        if maker.is_terminal() {
            return Err(EngineError::Invariant {
                context: format!("terminal maker {} still indexed", maker.order_id),
            });
        }
        if let (Some(taker_user), Some(maker_user)) = (&incoming.user_id, &maker.user_id) {
            if taker_user == maker_user {
                return Err(EngineError::Invariant {
                    context: format!("self-trade reached execution for user {}", taker_user),
                });
            }
        }
        if quantity > incoming.remaining_quantity || quantity > maker.remaining_quantity {
            return Err(EngineError::Invariant {
                context: format!("fill quantity {} exceeds a remainder", quantity),
            });
        }
        if maker.limit_price != Some(price)
            || !crossing::incoming_crosses(incoming.side, incoming.limit_price, price)
        {
            return Err(EngineError::Invariant {
                context: format!("fill price {} outside order limits", price),
            });
        }
        Ok(())
    }

    fn build_fill(
        &self,
        incoming: &Order,
        maker: &Order,
        price: Price,
        quantity: Quantity,
        timestamp: i64,
    ) -> Fill {
        let (buyer, seller) = match incoming.side {
            Side::Buy => (incoming, maker),
            Side::Sell => (maker, incoming),
        };
        let value = notional(quantity, price);
        let seq = self.trade_seq.fetch_add(1, Ordering::SeqCst);

        Fill {
            trade_id: TradeId::from_parts(timestamp, seq),
            trading_pair: incoming.trading_pair.clone(),
            price,
            quantity,
            buyer_order_id: buyer.order_id,
            seller_order_id: seller.order_id,
            buyer_user_id: buyer.user_id.clone(),
            seller_user_id: seller.user_id.clone(),
            buyer_fee: self.fees.fee_for(value, buyer.user_id.as_ref()),
            seller_fee: self.fees.fee_for(value, seller.user_id.as_ref()),
            timestamp,
            match_type: MatchType::from_remainders(
                buyer.remaining_quantity.saturating_sub(quantity),
                seller.remaining_quantity.saturating_sub(quantity),
            ),
        }
    }

    fn store_with_retry(&self, fill: &Fill) -> Result<(), EngineError> {
        let mut last_error = String::new();
        for attempt in 0..self.retry_limit.max(1) {
            match self.store.store_trade(fill) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        trade_id = %fill.trade_id,
                        attempt,
                        error = %err,
                        "ledger write failed"
                    );
                    last_error = err.to_string();
                }
            }
        }
        Err(EngineError::Transient { reason: last_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::{MemoryTradeStore, StoreError};
    use risk_engine::LimitsRegistry;
    use rust_decimal::Decimal;
    use types::ids::{Symbol, UserId};
    use types::order::{OrderIntent, OrderStatus, TimeInForce};
    use types::pair::TradingPair;

    const NOW: i64 = 1_708_123_456_789_000_000;

    struct FailingStore;

    impl TradeStore for FailingStore {
        fn store_trade(&self, _fill: &Fill) -> Result<(), StoreError> {
            Err(StoreError::Unavailable {
                reason: "down".to_string(),
            })
        }

        fn store_snapshot(&self, _: &Symbol, _: &str, _: u64) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn btc_usdt() -> TradingPair {
        TradingPair::new(
            Symbol::new("BTC/USDT"),
            Quantity::from_str("0.001").unwrap(),
            Quantity::from_str("100").unwrap(),
            2,
            6,
        )
    }

    fn funded_gate(users: &[(&str, u64, u64)]) -> RiskGate {
        let gate = RiskGate::new(LimitsRegistry::default());
        for (user, base, quote) in users {
            gate.deposit(
                &UserId::new(*user),
                &Symbol::new("BTC/USDT"),
                Decimal::from(*base),
                Decimal::from(*quote),
            );
        }
        gate
    }

    fn order(user: &str, side: Side, price: u64, qty: &str, seq: u64) -> Order {
        let intent = OrderIntent::limit(
            Symbol::new("BTC/USDT"),
            side,
            Price::from_u64(price),
            Quantity::from_str(qty).unwrap(),
            TimeInForce::Gtc,
        )
        .with_user(UserId::new(user));
        Order::accept(intent, seq, NOW)
    }

    #[test]
    fn test_execute_fill_updates_everything() {
        let fees = FeeSchedule::free();
        let gate = funded_gate(&[("alice", 0, 100_000), ("bob", 1, 0)]);
        let store = MemoryTradeStore::new();
        let seq = AtomicU64::new(1);
        let executor = TradeExecutor::new(&fees, &gate, &store, &seq, 3);

        let mut book = OrderBook::new(btc_usdt());
        let maker = order("bob", Side::Sell, 50_000, "1.0", 1);
        let maker_id = maker.order_id;
        gate.admit(&maker, Decimal::ZERO, NOW).unwrap();
        book.rest_order(maker);

        let mut incoming = order("alice", Side::Buy, 50_000, "1.0", 2);
        gate.admit(&incoming, Decimal::from(50_000), NOW).unwrap();

        let mut events = Vec::new();
        let fill = executor
            .execute_fill(
                &mut book,
                &mut incoming,
                maker_id,
                Price::from_u64(50_000),
                0,
                Quantity::from_str("1.0").unwrap(),
                NOW + 1,
                &mut events,
            )
            .unwrap();

        assert_eq!(fill.quantity, Quantity::from_str("1.0").unwrap());
        assert_eq!(fill.match_type, MatchType::Full);
        assert_eq!(incoming.status, OrderStatus::Filled);
        assert_eq!(book.resting_count(), 0);
        assert_eq!(store.trade_count(), 1);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Trade(_)));
        assert!(matches!(events[1], Event::OrderUpdate(_)));
        // Maker lock released at terminal state.
        assert!(!gate.has_lock(&maker_id));
    }

    #[test]
    fn test_trade_ids_monotone() {
        let fees = FeeSchedule::free();
        let gate = funded_gate(&[("alice", 0, 200_000), ("bob", 2, 0)]);
        let store = MemoryTradeStore::new();
        let seq = AtomicU64::new(10);
        let executor = TradeExecutor::new(&fees, &gate, &store, &seq, 3);

        let mut book = OrderBook::new(btc_usdt());
        for n in 0..2 {
            let maker = order("bob", Side::Sell, 50_000, "1.0", n);
            gate.admit(&maker, Decimal::ZERO, NOW).unwrap();
            book.rest_order(maker);
        }

        let mut incoming = order("alice", Side::Buy, 50_000, "2.0", 3);
        gate.admit(&incoming, Decimal::from(100_000), NOW).unwrap();

        let mut events = Vec::new();
        let mut trade_ids = Vec::new();
        for index in 0..2 {
            let _ = index;
            let maker_id = book
                .level_entry(Side::Sell, Price::from_u64(50_000), 0)
                .unwrap()
                .order_id;
            let fill = executor
                .execute_fill(
                    &mut book,
                    &mut incoming,
                    maker_id,
                    Price::from_u64(50_000),
                    0,
                    Quantity::from_str("1.0").unwrap(),
                    NOW + 1,
                    &mut events,
                )
                .unwrap();
            trade_ids.push(fill.trade_id);
        }
        assert_eq!(trade_ids[0], TradeId::from_parts(NOW + 1, 10));
        assert_eq!(trade_ids[1], TradeId::from_parts(NOW + 1, 11));
    }

    #[test]
    fn test_ledger_failure_leaves_no_partial_state() {
        let fees = FeeSchedule::free();
        let gate = funded_gate(&[("alice", 0, 100_000), ("bob", 1, 0)]);
        let store = FailingStore;
        let seq = AtomicU64::new(1);
        let executor = TradeExecutor::new(&fees, &gate, &store, &seq, 3);

        let mut book = OrderBook::new(btc_usdt());
        let maker = order("bob", Side::Sell, 50_000, "1.0", 1);
        let maker_id = maker.order_id;
        gate.admit(&maker, Decimal::ZERO, NOW).unwrap();
        book.rest_order(maker);

        let mut incoming = order("alice", Side::Buy, 50_000, "1.0", 2);
        gate.admit(&incoming, Decimal::from(50_000), NOW).unwrap();

        let mut events = Vec::new();
        let result = executor.execute_fill(
            &mut book,
            &mut incoming,
            maker_id,
            Price::from_u64(50_000),
            0,
            Quantity::from_str("1.0").unwrap(),
            NOW + 1,
            &mut events,
        );

        assert!(matches!(result, Err(EngineError::Transient { .. })));
        // Nothing moved: orders, book, positions, events.
        assert_eq!(incoming.filled_quantity, Quantity::zero());
        assert_eq!(
            book.order(&maker_id).unwrap().filled_quantity,
            Quantity::zero()
        );
        assert!(events.is_empty());
        let alice = gate
            .position(&UserId::new("alice"), &Symbol::new("BTC/USDT"))
            .unwrap();
        assert_eq!(alice.locked_quote, Decimal::from(50_000));
        assert_eq!(alice.base_balance, Decimal::ZERO);
    }

    #[test]
    fn test_self_trade_refused_at_execution() {
        let fees = FeeSchedule::free();
        let gate = funded_gate(&[("alice", 1, 100_000)]);
        let store = MemoryTradeStore::new();
        let seq = AtomicU64::new(1);
        let executor = TradeExecutor::new(&fees, &gate, &store, &seq, 3);

        let mut book = OrderBook::new(btc_usdt());
        let maker = order("alice", Side::Sell, 50_000, "1.0", 1);
        let maker_id = maker.order_id;
        gate.admit(&maker, Decimal::ZERO, NOW).unwrap();
        book.rest_order(maker);

        let mut incoming = order("alice", Side::Buy, 50_000, "1.0", 2);
        let mut events = Vec::new();
        let result = executor.execute_fill(
            &mut book,
            &mut incoming,
            maker_id,
            Price::from_u64(50_000),
            0,
            Quantity::from_str("1.0").unwrap(),
            NOW + 1,
            &mut events,
        );
        assert!(matches!(result, Err(EngineError::Invariant { .. })));
        assert_eq!(store.trade_count(), 0);
    }

    #[test]
    fn test_vip_fee_applied_per_side() {
        let mut fees = FeeSchedule::new(Decimal::new(5, 4)).unwrap(); // 0.05%
        fees.add_vip(UserId::new("alice"));
        let gate = funded_gate(&[("alice", 0, 100_000), ("bob", 1, 0)]);
        let store = MemoryTradeStore::new();
        let seq = AtomicU64::new(1);
        let executor = TradeExecutor::new(&fees, &gate, &store, &seq, 3);

        let mut book = OrderBook::new(btc_usdt());
        let maker = order("bob", Side::Sell, 50_000, "1.0", 1);
        let maker_id = maker.order_id;
        gate.admit(&maker, Decimal::ZERO, NOW).unwrap();
        book.rest_order(maker);

        let mut incoming = order("alice", Side::Buy, 50_000, "1.0", 2);
        gate.admit(&incoming, Decimal::from(50_100), NOW).unwrap();

        let mut events = Vec::new();
        let fill = executor
            .execute_fill(
                &mut book,
                &mut incoming,
                maker_id,
                Price::from_u64(50_000),
                0,
                Quantity::from_str("1.0").unwrap(),
                NOW + 1,
                &mut events,
            )
            .unwrap();

        // Alice is VIP: 25 × 0.5; Bob pays the full 25.
        assert_eq!(fill.buyer_fee, Decimal::new(125, 1));
        assert_eq!(fill.seller_fee, Decimal::from(25));
    }
}
