//! Engine
//!
//! Owns every pair's order book behind a per-pair writer lock, assigns
//! sequence numbers, runs the submit/cancel pipeline, and publishes events
//! in the exact order matching produced them. Different pairs proceed in
//! parallel; one pair's intents are strictly serial.
//!
//! Failure handling: ledger and sink calls retry a bounded number of times
//! inside the writer step. Persistent failure degrades the pair — it
//! refuses intents until an operator clears it. Invariant violations
//! quarantine the pair the same way, with the context logged.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use ledger::{Journal, TradeStore};
use risk_engine::RiskGate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use types::errors::EngineError;
use types::fee::{FeeError, FeeSchedule};
use types::ids::{OrderId, Symbol, UserId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderIntent, OrderStatus, OrderType, Side};
use types::pair::TradingPair;
use types::trade::Fill;

use crate::book::OrderBook;
use crate::config::{EngineConfig, SelfTradePolicy};
use crate::delta;
use crate::events::{channels_for, Event, MarketStats, Snapshot};
use crate::matching::{execute_order, TradeExecutor};
use crate::sink::EventSink;

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub executed_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub average_price: Option<Price>,
    pub fills: Vec<Fill>,
    pub message: Option<String>,
}

impl OrderResult {
    fn from_order(order: &Order, fills: Vec<Fill>, message: Option<String>) -> Self {
        Self {
            order_id: order.order_id,
            status: order.status,
            executed_quantity: order.filled_quantity,
            remaining_quantity: order.remaining_quantity,
            average_price: order.average_fill_price,
            fills,
            message,
        }
    }
}

/// Cancel request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelIntent {
    pub order_id: OrderId,
    pub trading_pair: Symbol,
}

/// Cancel outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelResult {
    pub cancelled: bool,
    pub reason: Option<String>,
}

/// One pair's serial state: the book, its sequence counter, health.
struct PairShard {
    book: OrderBook,
    next_sequence: u64,
    degraded: bool,
}

/// The engine: all books, the risk gate, and the outbound surfaces.
pub struct Engine {
    shards: DashMap<Symbol, Mutex<PairShard>>,
    gate: Arc<RiskGate>,
    store: Arc<dyn TradeStore>,
    sink: Arc<dyn EventSink>,
    journal: Option<Arc<Journal>>,
    fees: RwLock<FeeSchedule>,
    trade_sequence: AtomicU64,
    self_trade_policy: SelfTradePolicy,
    snapshot_depth: usize,
    ledger_retry_limit: u32,
    publish_retry_limit: u32,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        gate: Arc<RiskGate>,
        store: Arc<dyn TradeStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            shards: DashMap::new(),
            gate,
            store,
            sink,
            journal: None,
            fees: RwLock::new(config.fees),
            trade_sequence: AtomicU64::new(1),
            self_trade_policy: config.self_trade_policy,
            snapshot_depth: config.snapshot_depth,
            ledger_retry_limit: config.ledger_retry_limit,
            publish_retry_limit: config.publish_retry_limit,
        }
    }

    /// Record every published event into a journal (replay support).
    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Register a trading pair. Replaces nothing: a pair registers once.
    pub fn register_pair(&self, pair: TradingPair) {
        let symbol = pair.symbol.clone();
        self.shards.insert(
            symbol.clone(),
            Mutex::new(PairShard {
                book: OrderBook::new(pair),
                next_sequence: 1,
                degraded: false,
            }),
        );
        info!(%symbol, "registered trading pair");
    }

    /// Submit an order intent. One bounded writer step on the pair.
    ///
    /// Validation and risk failures return `Err` with nothing admitted.
    /// Time-in-force rejections (FOK short, IOC zero, no liquidity) return
    /// an `OrderResult` with status `Rejected` and a reason message.
    pub fn submit(&self, intent: OrderIntent, now: i64) -> Result<OrderResult, EngineError> {
        let shard_ref = self
            .shards
            .get(&intent.trading_pair)
            .ok_or_else(|| {
                EngineError::Validation(types::errors::ValidationError::UnknownPair {
                    symbol: intent.trading_pair.to_string(),
                })
            })?;
        let mut shard = shard_ref.lock().expect("pair writer lock poisoned");
        if shard.degraded {
            return Err(EngineError::Degraded {
                symbol: intent.trading_pair.to_string(),
            });
        }

        shard
            .book
            .validate_intent(intent.order_type, intent.price, intent.quantity)?;

        // Market orders meet an empty opposite side before any lock.
        if intent.order_type == OrderType::Market {
            let opposite_empty = match intent.side {
                Side::Buy => shard.book.asks().is_empty(),
                Side::Sell => shard.book.bids().is_empty(),
            };
            if opposite_empty {
                return self.reject_no_liquidity(&mut shard, intent, now);
            }
        }

        // Reservation the buy side needs; also the market-buy estimate.
        let required_quote = match (intent.side, intent.order_type, intent.price) {
            (Side::Buy, OrderType::Limit, Some(price)) => {
                intent.quantity.as_decimal() * price.as_decimal()
            }
            (Side::Buy, OrderType::Market, _) => {
                let buffer = self.gate.limits_for(&intent.trading_pair).slippage_buffer;
                shard
                    .book
                    .best_ask()
                    .map(|best_ask| {
                        intent.quantity.as_decimal()
                            * best_ask.as_decimal()
                            * (Decimal::ONE + buffer)
                    })
                    .unwrap_or(Decimal::ZERO)
            }
            _ => Decimal::ZERO,
        };

        let mark_price = shard.book.mark_price();
        let check = self
            .gate
            .check(&intent, mark_price, required_quote, now)?;
        if !check.warnings.is_empty() {
            warn!(pair = %intent.trading_pair, warnings = ?check.warnings, "pre-trade warnings");
        }

        // Acceptance: sequence, then fund lock.
        let sequence = shard.next_sequence;
        shard.next_sequence += 1;
        let mut order = Order::accept(intent, sequence, now);
        if let Err(err) = self.gate.admit(&order, required_quote, now) {
            // The pre-trade check passed moments ago under this same writer
            // lock; a lock failure here is state corruption.
            shard.degraded = true;
            error!(order_id = %order.order_id, error = %err, "fund lock failed after passing check; quarantining pair");
            return Err(err.into());
        }

        let depth = self.snapshot_depth;
        let version_before = shard.book.version();
        let snapshot_before = shard.book.snapshot(depth, now);

        let fees = self.fees.read().expect("fee schedule lock poisoned").clone();
        let executor = TradeExecutor::new(
            &fees,
            &self.gate,
            self.store.as_ref(),
            &self.trade_sequence,
            self.ledger_retry_limit,
        );

        let mut events = Vec::new();
        let outcome = execute_order(
            &mut shard.book,
            &mut order,
            &executor,
            self.self_trade_policy,
            &mut events,
            now,
        );

        match outcome {
            Ok(fills) => {
                self.release_if_not_resting(&shard.book, &order);
                self.append_book_events(&mut shard.book, version_before, &snapshot_before, depth, now, &mut events);
                events.push(Event::OrderUpdate(order.clone()));
                self.publish_step(&mut shard, events);
                Ok(OrderResult::from_order(&order, fills, None))
            }
            Err(EngineError::UnfulfillableTif { reason }) => {
                // Zero fills by construction; the lock comes back in full.
                if order.user_id.is_some() {
                    let _ = self.gate.release(&order.order_id);
                }
                let events = vec![Event::OrderUpdate(order.clone())];
                self.publish_step(&mut shard, events);
                Ok(OrderResult::from_order(&order, Vec::new(), Some(reason)))
            }
            Err(EngineError::Transient { reason }) => {
                // Completed fills stand; the remainder does not rest and the
                // pair stops taking intents.
                shard.degraded = true;
                error!(pair = %order.trading_pair, %reason, "transient failure exhausted retries; pair degraded");
                if !order.has_fills() {
                    order.reject(now);
                }
                if order.user_id.is_some() {
                    let _ = self.gate.release(&order.order_id);
                }
                self.append_book_events(&mut shard.book, version_before, &snapshot_before, depth, now, &mut events);
                events.push(Event::OrderUpdate(order.clone()));
                let fills = order_fills(&events);
                self.publish_step(&mut shard, events);
                Ok(OrderResult::from_order(
                    &order,
                    fills,
                    Some(format!("pair degraded: {}", reason)),
                ))
            }
            Err(err) => {
                shard.degraded = true;
                error!(pair = %order.trading_pair, error = %err, "quarantining pair");
                Err(err)
            }
        }
    }

    /// Cancel a resting order. A first-class writer step, serialized behind
    /// any in-flight fills for the same pair.
    pub fn cancel(&self, intent: CancelIntent, now: i64) -> Result<CancelResult, EngineError> {
        let shard_ref = self
            .shards
            .get(&intent.trading_pair)
            .ok_or_else(|| EngineError::NotFound {
                what: format!("trading pair {}", intent.trading_pair),
            })?;
        let mut shard = shard_ref.lock().expect("pair writer lock poisoned");
        if shard.degraded {
            return Err(EngineError::Degraded {
                symbol: intent.trading_pair.to_string(),
            });
        }

        let depth = self.snapshot_depth;
        let snapshot_before = shard.book.snapshot(depth, now);
        let Some(cancelled) = shard.book.cancel(&intent.order_id, now) else {
            return Ok(CancelResult {
                cancelled: false,
                reason: Some("not found".to_string()),
            });
        };
        if cancelled.user_id.is_some() {
            if let Err(err) = self.gate.release(&cancelled.order_id) {
                shard.degraded = true;
                error!(order_id = %cancelled.order_id, error = %err, "lock release failed on cancel; quarantining pair");
                return Err(err.into());
            }
        }

        let mut events = vec![Event::OrderUpdate(cancelled)];
        let snapshot_after = shard.book.snapshot(depth, now);
        let book_delta = delta::diff(&snapshot_before, &snapshot_after);
        events.push(Event::OrderbookSnapshot(snapshot_after));
        if !book_delta.is_empty() {
            events.push(Event::OrderbookDelta(book_delta));
        }
        self.publish_step(&mut shard, events);

        Ok(CancelResult {
            cancelled: true,
            reason: None,
        })
    }

    /// Aggregated top-of-book snapshot for a pair.
    pub fn snapshot(
        &self,
        symbol: &Symbol,
        depth: Option<usize>,
        now: i64,
    ) -> Result<Snapshot, EngineError> {
        let shard_ref = self.shards.get(symbol).ok_or_else(|| EngineError::NotFound {
            what: format!("trading pair {}", symbol),
        })?;
        let shard = shard_ref.lock().expect("pair writer lock poisoned");
        Ok(shard
            .book
            .snapshot(depth.unwrap_or(self.snapshot_depth), now))
    }

    /// Market statistics for a pair.
    pub fn market_stats(&self, symbol: &Symbol) -> Result<MarketStats, EngineError> {
        let shard_ref = self.shards.get(symbol).ok_or_else(|| EngineError::NotFound {
            what: format!("trading pair {}", symbol),
        })?;
        let shard = shard_ref.lock().expect("pair writer lock poisoned");
        Ok(shard.book.market_stats())
    }

    /// Admin: replace the flat fee rate at runtime.
    pub fn set_fee_rate(&self, rate: Decimal) -> Result<(), FeeError> {
        self.fees
            .write()
            .expect("fee schedule lock poisoned")
            .set_rate(rate)
    }

    /// Admin: replace the VIP discount factor.
    pub fn set_vip_discount(&self, discount: Decimal) -> Result<(), FeeError> {
        self.fees
            .write()
            .expect("fee schedule lock poisoned")
            .set_vip_discount(discount)
    }

    /// Admin: tag a user as VIP for the fee discount.
    pub fn add_vip(&self, user: UserId) {
        self.fees
            .write()
            .expect("fee schedule lock poisoned")
            .add_vip(user);
    }

    /// Whether a pair is currently refusing intents.
    pub fn is_degraded(&self, symbol: &Symbol) -> bool {
        self.shards
            .get(symbol)
            .map(|shard| shard.lock().expect("pair writer lock poisoned").degraded)
            .unwrap_or(false)
    }

    /// Admin: clear a degraded/quarantined pair after recovery.
    pub fn clear_degraded(&self, symbol: &Symbol) -> bool {
        let Some(shard_ref) = self.shards.get(symbol) else {
            return false;
        };
        let mut shard = shard_ref.lock().expect("pair writer lock poisoned");
        let was = shard.degraded;
        shard.degraded = false;
        if was {
            info!(%symbol, "pair cleared for trading");
        }
        was
    }

    /// Reject a market order against an empty opposite side, pre-lock.
    fn reject_no_liquidity(
        &self,
        shard: &mut PairShard,
        intent: OrderIntent,
        now: i64,
    ) -> Result<OrderResult, EngineError> {
        let sequence = shard.next_sequence;
        shard.next_sequence += 1;
        let mut order = Order::accept(intent, sequence, now);
        order.reject(now);
        self.publish_step(shard, vec![Event::OrderUpdate(order.clone())]);
        Ok(OrderResult::from_order(
            &order,
            Vec::new(),
            Some("no liquidity".to_string()),
        ))
    }

    /// Release the incoming order's lock unless its residual rests.
    fn release_if_not_resting(&self, book: &OrderBook, order: &Order) {
        if order.user_id.is_none() {
            return;
        }
        let resting = book.order(&order.order_id).is_some();
        if !resting && self.gate.has_lock(&order.order_id) {
            if let Err(err) = self.gate.release(&order.order_id) {
                warn!(order_id = %order.order_id, error = %err, "lock release failed");
            }
        }
    }

    /// Stage snapshot (and non-empty delta) events when the book changed.
    fn append_book_events(
        &self,
        book: &mut OrderBook,
        version_before: u64,
        snapshot_before: &Snapshot,
        depth: usize,
        now: i64,
        events: &mut Vec<Event>,
    ) {
        if book.version() == version_before {
            return;
        }
        let snapshot_after = book.snapshot(depth, now);
        if let Ok(payload) = serde_json::to_string(&snapshot_after) {
            if let Err(err) = self
                .store
                .store_snapshot(&snapshot_after.trading_pair, &payload, 60)
            {
                warn!(error = %err, "snapshot store failed");
            }
        }
        let book_delta = delta::diff(snapshot_before, &snapshot_after);
        events.push(Event::OrderbookSnapshot(snapshot_after));
        if !book_delta.is_empty() {
            events.push(Event::OrderbookDelta(book_delta));
        }
    }

    /// Publish a step's events in order, journaling each. Persistent sink
    /// failure degrades the pair; state is never unwound — delivery is
    /// at-least-once with the trade id as the dedup key.
    fn publish_step(&self, shard: &mut PairShard, events: Vec<Event>) {
        for event in events {
            if let Some(journal) = &self.journal {
                let result = match &event {
                    Event::Trade(fill) => journal.append(event.kind(), fill.timestamp, fill),
                    Event::OrderUpdate(order) => {
                        journal.append(event.kind(), order.updated_at, order)
                    }
                    Event::OrderbookSnapshot(snap) => {
                        journal.append(event.kind(), snap.timestamp, snap)
                    }
                    Event::OrderbookDelta(d) => journal.append(event.kind(), d.timestamp, d),
                };
                if let Err(err) = result {
                    warn!(error = %err, "journal append failed");
                }
            }

            for channel in channels_for(&event) {
                let mut delivered = false;
                for attempt in 0..self.publish_retry_limit.max(1) {
                    match self.sink.publish(&channel, &event) {
                        Ok(()) => {
                            delivered = true;
                            break;
                        }
                        Err(err) => {
                            warn!(%channel, attempt, error = %err, "publish failed");
                        }
                    }
                }
                if !delivered {
                    shard.degraded = true;
                    error!(%channel, "publish retries exhausted; pair degraded");
                    return;
                }
            }
        }
    }
}

/// Fills already staged as trade events (used when a step aborts midway).
fn order_fills(events: &[Event]) -> Vec<Fill> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Trade(fill) => Some(fill.clone()),
            _ => None,
        })
        .collect()
}
