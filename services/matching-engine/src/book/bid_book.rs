//! Bid (buy-side) price ladder
//!
//! Buy orders keyed by price in a BTreeMap; the best bid is the highest
//! price, so best-access walks the map from the back. FIFO within a level.

use std::collections::BTreeMap;
use types::ids::{OrderId, UserId};
use types::numeric::{Price, Quantity};
use types::order::Order;

use super::price_level::{LevelEntry, PriceLevel};
use crate::events::DepthLevel;

/// Buy-side index: price levels ordered with the highest price best.
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resting order at its limit price.
    ///
    /// # Panics
    /// Panics if the order has no limit price; market orders never rest.
    pub fn insert(&mut self, order: &Order) {
        let price = order.limit_price.expect("resting bid must carry a price");
        self.levels.entry(price).or_default().push_back(
            order.order_id,
            order.user_id.clone(),
            order.remaining_quantity,
        );
    }

    /// Remove an order from its level, deleting the level when emptied.
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> bool {
        if let Some(level) = self.levels.get_mut(&price) {
            if level.remove(order_id).is_some() {
                if level.is_empty() {
                    self.levels.remove(&price);
                }
                return true;
            }
        }
        false
    }

    /// Best (highest) bid price.
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    /// Mutable access to the level at an exact price.
    pub(crate) fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Delete a level if it has emptied.
    pub(crate) fn prune_level(&mut self, price: Price) {
        if self
            .levels
            .get(&price)
            .map(|l| l.is_empty())
            .unwrap_or(false)
        {
            self.levels.remove(&price);
        }
    }

    /// Entry at queue position `index` within the level at `price`.
    pub fn entry_at(&self, price: Price, index: usize) -> Option<&LevelEntry> {
        self.levels.get(&price).and_then(|level| level.entry_at(index))
    }

    /// The best price strictly below `cursor`, or the best price overall
    /// when `cursor` is None. Drives the match walk as levels are consumed
    /// or skipped.
    pub fn next_price_below(&self, cursor: Option<Price>) -> Option<Price> {
        match cursor {
            None => self.best_price(),
            Some(cursor) => self
                .levels
                .range(..cursor)
                .next_back()
                .map(|(price, _)| *price),
        }
    }

    /// Aggregated view of the best `n` levels, best first.
    pub fn top_levels(&self, n: usize) -> Vec<DepthLevel> {
        self.levels
            .iter()
            .rev()
            .take(n)
            .map(|(price, level)| DepthLevel {
                price: *price,
                quantity: level.total_quantity().as_decimal(),
                order_count: level.order_count() as u32,
            })
            .collect()
    }

    /// Total quantity at prices ≥ `limit` (all prices when None), optionally
    /// excluding one user's own orders. This is the fill-or-kill dry run.
    pub fn quantity_at_or_better(
        &self,
        limit: Option<Price>,
        exclude: Option<&UserId>,
    ) -> Quantity {
        self.levels
            .iter()
            .rev()
            .take_while(|(price, _)| limit.map(|l| **price >= l).unwrap_or(true))
            .fold(Quantity::zero(), |acc, (_, level)| {
                acc + level.quantity_excluding(exclude)
            })
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Sum of remaining quantity across every level (snapshot consistency).
    pub fn total_quantity(&self) -> Quantity {
        self.levels
            .values()
            .fold(Quantity::zero(), |acc, level| acc + level.total_quantity())
    }
}
