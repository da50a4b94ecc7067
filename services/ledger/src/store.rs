//! Trade store interface and in-memory implementation
//!
//! The engine writes, subscribers read. `store_trade` must be idempotent on
//! trade id: the engine guarantees at-least-once delivery, so a retried
//! write of the same trade is a no-op, not a duplicate.

use std::collections::VecDeque;

use dashmap::DashMap;
use thiserror::Error;
use types::ids::{Symbol, TradeId};
use types::trade::Fill;

/// How many recent trades are kept per pair.
pub const RECENT_TRADES_LIMIT: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("trade store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Write-only ledger interface as seen from the engine.
pub trait TradeStore: Send + Sync {
    /// Persist a fill. Must be idempotent on `fill.trade_id`.
    fn store_trade(&self, fill: &Fill) -> Result<(), StoreError>;

    /// Persist a serialized orderbook snapshot with a time-to-live hint.
    /// Implementations may drop it; the engine never reads it back.
    fn store_snapshot(
        &self,
        symbol: &Symbol,
        payload: &str,
        ttl_secs: u64,
    ) -> Result<(), StoreError>;
}

/// In-memory trade store.
///
/// Keeps every trade keyed by id plus a bounded recent list per pair.
#[derive(Default)]
pub struct MemoryTradeStore {
    trades: DashMap<TradeId, Fill>,
    recent: DashMap<Symbol, VecDeque<TradeId>>,
    snapshots: DashMap<Symbol, (String, u64)>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a trade by id.
    pub fn trade(&self, trade_id: &TradeId) -> Option<Fill> {
        self.trades.get(trade_id).map(|t| t.clone())
    }

    /// Total number of distinct trades stored.
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Recent trades for a pair, newest first, up to `limit`.
    pub fn recent_trades(&self, symbol: &Symbol, limit: usize) -> Vec<Fill> {
        let Some(ids) = self.recent.get(symbol) else {
            return Vec::new();
        };
        ids.iter()
            .rev()
            .take(limit)
            .filter_map(|id| self.trades.get(id).map(|t| t.clone()))
            .collect()
    }
}

impl TradeStore for MemoryTradeStore {
    fn store_trade(&self, fill: &Fill) -> Result<(), StoreError> {
        // Idempotent on trade_id: a redelivered fill changes nothing.
        if self.trades.contains_key(&fill.trade_id) {
            return Ok(());
        }
        self.trades.insert(fill.trade_id.clone(), fill.clone());

        let mut recent = self.recent.entry(fill.trading_pair.clone()).or_default();
        recent.push_back(fill.trade_id.clone());
        while recent.len() > RECENT_TRADES_LIMIT {
            recent.pop_front();
        }
        Ok(())
    }

    fn store_snapshot(
        &self,
        symbol: &Symbol,
        payload: &str,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        self.snapshots
            .insert(symbol.clone(), (payload.to_string(), ttl_secs));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::ids::{OrderId, UserId};
    use types::numeric::{Price, Quantity};
    use types::trade::MatchType;

    fn make_fill(seq: u64) -> Fill {
        Fill {
            trade_id: TradeId::from_parts(1_708_123_456_789_000_000, seq),
            trading_pair: Symbol::new("BTC/USDT"),
            price: Price::from_u64(50_000),
            quantity: Quantity::from_str("0.1").unwrap(),
            buyer_order_id: OrderId::new(),
            seller_order_id: OrderId::new(),
            buyer_user_id: Some(UserId::new("alice")),
            seller_user_id: Some(UserId::new("bob")),
            buyer_fee: Decimal::ZERO,
            seller_fee: Decimal::ZERO,
            timestamp: 1_708_123_456_789_000_000,
            match_type: MatchType::Full,
        }
    }

    #[test]
    fn test_store_and_fetch() {
        let store = MemoryTradeStore::new();
        let fill = make_fill(1);
        store.store_trade(&fill).unwrap();

        assert_eq!(store.trade(&fill.trade_id), Some(fill));
        assert_eq!(store.trade_count(), 1);
    }

    #[test]
    fn test_idempotent_on_trade_id() {
        let store = MemoryTradeStore::new();
        let fill = make_fill(1);
        store.store_trade(&fill).unwrap();
        store.store_trade(&fill).unwrap();
        store.store_trade(&fill).unwrap();

        assert_eq!(store.trade_count(), 1);
        assert_eq!(
            store.recent_trades(&Symbol::new("BTC/USDT"), 10).len(),
            1
        );
    }

    #[test]
    fn test_recent_trades_newest_first() {
        let store = MemoryTradeStore::new();
        for seq in 1..=5 {
            store.store_trade(&make_fill(seq)).unwrap();
        }
        let recent = store.recent_trades(&Symbol::new("BTC/USDT"), 3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].trade_id, TradeId::from_parts(1_708_123_456_789_000_000, 5));
    }

    #[test]
    fn test_recent_trades_bounded() {
        let store = MemoryTradeStore::new();
        for seq in 0..(RECENT_TRADES_LIMIT as u64 + 50) {
            store.store_trade(&make_fill(seq)).unwrap();
        }
        let recent = store.recent_trades(&Symbol::new("BTC/USDT"), usize::MAX);
        assert_eq!(recent.len(), RECENT_TRADES_LIMIT);
    }

    #[test]
    fn test_unknown_pair_has_no_recent() {
        let store = MemoryTradeStore::new();
        assert!(store.recent_trades(&Symbol::new("ETH/USDC"), 10).is_empty());
    }
}
