//! Risk gate orchestrator
//!
//! Owns every user's per-pair position and the fund-lock table. All calls
//! for one pair happen inside that pair's writer step, so the maps are
//! sharded for cross-pair concurrency but never contended within a pair.

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::warn;
use types::errors::{FundsError, RiskError};
use types::ids::{OrderId, Symbol, UserId};
use types::numeric::Price;
use types::order::{Order, OrderIntent, Side};
use types::position::UserPosition;
use types::risk::RiskCheck;
use types::trade::Fill;

use crate::funds::{LockedAsset, OrderLock};
use crate::limits::LimitsRegistry;
use crate::validator::{pre_trade_check, CheckInput};

/// Per-user risk state and fund locks across all pairs.
///
/// Anonymous (user-less) orders pass the gate untouched: no position, no
/// lock, no counters. Production ingress is expected to require user ids.
pub struct RiskGate {
    limits: LimitsRegistry,
    positions: DashMap<(UserId, Symbol), UserPosition>,
    locks: DashMap<OrderId, OrderLock>,
}

impl RiskGate {
    pub fn new(limits: LimitsRegistry) -> Self {
        Self {
            limits,
            positions: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Credit a user's balances (bootstrap and deposits).
    pub fn deposit(&self, user: &UserId, symbol: &Symbol, base: Decimal, quote: Decimal) {
        let mut entry = self
            .positions
            .entry((user.clone(), symbol.clone()))
            .or_default();
        entry.deposit_base(base);
        entry.deposit_quote(quote);
    }

    /// Limits in effect for a pair (engine reads the slippage buffer and
    /// pacing intervals from here).
    pub fn limits_for(&self, symbol: &Symbol) -> types::risk::RiskLimits {
        self.limits.for_pair(symbol).clone()
    }

    /// Snapshot of a user's position on a pair.
    pub fn position(&self, user: &UserId, symbol: &Symbol) -> Option<UserPosition> {
        self.positions
            .get(&(user.clone(), symbol.clone()))
            .map(|p| p.clone())
    }

    /// Pre-trade check. Read-only; no lock is taken on success.
    pub fn check(
        &self,
        intent: &OrderIntent,
        mark_price: Option<Price>,
        required_quote: Decimal,
        now: i64,
    ) -> Result<RiskCheck, RiskError> {
        let Some(user) = &intent.user_id else {
            return Ok(RiskCheck::clean());
        };
        let position = self
            .position(user, &intent.trading_pair)
            .unwrap_or_default();
        let input = CheckInput {
            intent,
            mark_price,
            required_quote,
            now,
        };
        pre_trade_check(input, &position, self.limits.for_pair(&intent.trading_pair))
    }

    /// Lock funds for an accepted order and start open-order accounting.
    ///
    /// `required_quote` is the reservation for buys (limit: qty × price;
    /// market: the best-ask estimate); sells always reserve the base
    /// quantity.
    pub fn admit(
        &self,
        order: &Order,
        required_quote: Decimal,
        now: i64,
    ) -> Result<(), FundsError> {
        let Some(user) = &order.user_id else {
            return Ok(());
        };
        let key = (user.clone(), order.trading_pair.clone());
        let mut position = self.positions.entry(key).or_default();

        let locked = match order.side {
            Side::Buy => {
                position.lock_quote(required_quote)?;
                required_quote
            }
            Side::Sell => {
                let qty = order.original_quantity.as_decimal();
                position.lock_base(qty)?;
                qty
            }
        };
        position.inc_open_orders();
        position.touch(now);
        // Lock ordering: never hold a position entry while touching the
        // lock table (settlement acquires them the other way around).
        drop(position);

        self.locks.insert(
            order.order_id,
            OrderLock::new(
                order.order_id,
                user.clone(),
                order.trading_pair.clone(),
                order.side,
                locked,
            ),
        );
        Ok(())
    }

    /// Settle one fill on both sides.
    ///
    /// Buyer: qty × price plus the buyer fee drawn from the lock first, then
    /// from available quote; base credited. Seller: base delivered from the
    /// lock; quote proceeds net of the seller fee credited.
    pub fn settle_fill(&self, fill: &Fill) -> Result<(), FundsError> {
        let cost = fill.notional();
        let qty = fill.quantity.as_decimal();

        if let Some(buyer) = &fill.buyer_user_id {
            self.settle_buyer(buyer, fill, cost + fill.buyer_fee, qty)?;
        }
        if let Some(seller) = &fill.seller_user_id {
            self.settle_seller(seller, fill, cost - fill.seller_fee, qty)?;
        }
        Ok(())
    }

    fn settle_buyer(
        &self,
        buyer: &UserId,
        fill: &Fill,
        total_quote: Decimal,
        qty: Decimal,
    ) -> Result<(), FundsError> {
        let mut lock = self
            .locks
            .get_mut(&fill.buyer_order_id)
            .ok_or_else(|| FundsError::UnknownLock {
                order_id: fill.buyer_order_id.to_string(),
            })?;
        let covered = lock.draw(total_quote);
        let shortfall = total_quote - covered;
        drop(lock);

        let key = (buyer.clone(), fill.trading_pair.clone());
        let mut position = self.positions.entry(key).or_default();
        position.spend_locked_quote(covered)?;
        if shortfall > Decimal::ZERO {
            // Fee (or slippage past the market-buy estimate) beyond the
            // reservation settles from the available balance.
            position.debit_quote(shortfall)?;
        }
        position.credit_base(qty);
        position.record_volume(fill.notional(), fill.timestamp);
        Ok(())
    }

    fn settle_seller(
        &self,
        seller: &UserId,
        fill: &Fill,
        proceeds: Decimal,
        qty: Decimal,
    ) -> Result<(), FundsError> {
        let mut lock = self
            .locks
            .get_mut(&fill.seller_order_id)
            .ok_or_else(|| FundsError::UnknownLock {
                order_id: fill.seller_order_id.to_string(),
            })?;
        let covered = lock.draw(qty);
        drop(lock);
        if covered < qty {
            // A sell lock reserves the full quantity up front; a shortfall
            // here means the book and the lock table disagree.
            warn!(order_id = %fill.seller_order_id, "sell lock shortfall");
            return Err(FundsError::LockShortfall {
                asset: "base".to_string(),
                required: qty,
                locked: covered,
            });
        }

        let key = (seller.clone(), fill.trading_pair.clone());
        let mut position = self.positions.entry(key).or_default();
        position.spend_locked_base(qty)?;
        position.credit_quote(proceeds);
        position.record_volume(fill.notional(), fill.timestamp);
        Ok(())
    }

    /// Release an order's remaining lock and close its open-order slot.
    ///
    /// Called when an order reaches a terminal state (cancelled, filled with
    /// a price-improvement surplus left in the lock, or rejected after
    /// admission). Returns the amount released.
    pub fn release(&self, order_id: &OrderId) -> Result<Decimal, FundsError> {
        let (_, lock) = self
            .locks
            .remove(order_id)
            .ok_or_else(|| FundsError::UnknownLock {
                order_id: order_id.to_string(),
            })?;

        let key = (lock.user_id.clone(), lock.symbol.clone());
        let mut position = self.positions.entry(key).or_default();
        if lock.remaining > Decimal::ZERO {
            match lock.asset {
                LockedAsset::Base => position.unlock_base(lock.remaining)?,
                LockedAsset::Quote => position.unlock_quote(lock.remaining)?,
            }
        }
        position.dec_open_orders();
        Ok(lock.remaining)
    }

    /// Whether an order still holds a lock record.
    pub fn has_lock(&self, order_id: &OrderId) -> bool {
        self.locks.contains_key(order_id)
    }
}
