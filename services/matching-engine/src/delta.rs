//! Orderbook deltas
//!
//! Incremental subscribers receive the difference between two successive
//! snapshots instead of the full depth: changed levels carry their new
//! aggregate, removed levels carry just the price.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::Symbol;
use types::numeric::Price;

use crate::events::{DepthLevel, Snapshot};

/// Difference between two snapshots of the same pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDelta {
    pub trading_pair: Symbol,
    /// Bid levels whose aggregate changed or that appeared.
    pub bid_changes: Vec<DepthLevel>,
    /// Bid prices that emptied out.
    pub bid_removals: Vec<Price>,
    pub ask_changes: Vec<DepthLevel>,
    pub ask_removals: Vec<Price>,
    /// Timestamp of the newer snapshot.
    pub timestamp: i64,
}

impl BookDelta {
    pub fn is_empty(&self) -> bool {
        self.bid_changes.is_empty()
            && self.bid_removals.is_empty()
            && self.ask_changes.is_empty()
            && self.ask_removals.is_empty()
    }
}

/// Compute the delta that turns `prev` into `next`.
pub fn diff(prev: &Snapshot, next: &Snapshot) -> BookDelta {
    let (bid_changes, bid_removals) = diff_side(&prev.bids, &next.bids);
    let (ask_changes, ask_removals) = diff_side(&prev.asks, &next.asks);
    BookDelta {
        trading_pair: next.trading_pair.clone(),
        bid_changes,
        bid_removals,
        ask_changes,
        ask_removals,
        timestamp: next.timestamp,
    }
}

fn diff_side(prev: &[DepthLevel], next: &[DepthLevel]) -> (Vec<DepthLevel>, Vec<Price>) {
    let before: BTreeMap<Price, (Decimal, u32)> = prev
        .iter()
        .map(|level| (level.price, (level.quantity, level.order_count)))
        .collect();

    let mut changes = Vec::new();
    for level in next {
        match before.get(&level.price) {
            Some((qty, count)) if *qty == level.quantity && *count == level.order_count => {}
            _ => changes.push(level.clone()),
        }
    }

    let after: BTreeMap<Price, ()> = next.iter().map(|level| (level.price, ())).collect();
    let removals = prev
        .iter()
        .filter(|level| !after.contains_key(&level.price))
        .map(|level| level.price)
        .collect();

    (changes, removals)
}
