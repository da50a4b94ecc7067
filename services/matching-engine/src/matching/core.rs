//! The matching walk
//!
//! Price-time priority over the opposite ladder: best price first, FIFO
//! within a level, self-trade liquidity handled by policy. Time-in-force is
//! decided here after the walk; fill-or-kill runs a dry pass first so a
//! short book rejects with zero side effects.
//!
//! A price cursor, not just "best", drives the outer loop: the skip policy
//! can leave a user's own orders resting at the best level, and the walk
//! must move past them to worse prices without consuming them.

use tracing::debug;
use types::errors::EngineError;
use types::order::{Order, OrderStatus, TimeInForce};
use types::trade::Fill;

use crate::book::OrderBook;
use crate::config::SelfTradePolicy;
use crate::events::Event;
use crate::matching::crossing;
use crate::matching::executor::TradeExecutor;

/// Match an admitted order against the book and apply its time-in-force.
///
/// On success the order carries its final status, residual GTC quantity is
/// resting, and `events` holds the per-fill trade and maker-update events in
/// execution order. An `UnfulfillableTif` error is returned only when zero
/// fills happened, so rejection has no side effects to undo.
pub fn execute_order(
    book: &mut OrderBook,
    order: &mut Order,
    executor: &TradeExecutor<'_>,
    policy: SelfTradePolicy,
    events: &mut Vec<Event>,
    timestamp: i64,
) -> Result<Vec<Fill>, EngineError> {
    // Fill-or-kill dry run: enough non-self quantity at crossing prices, or
    // reject before touching anything.
    if order.time_in_force == TimeInForce::Fok {
        let fillable =
            book.fillable_against(order.side, order.limit_price, order.user_id.as_ref());
        if fillable < order.remaining_quantity {
            order.reject(timestamp);
            return Err(EngineError::UnfulfillableTif {
                reason: "FOK not fully executable".to_string(),
            });
        }
    }

    let mut fills = Vec::new();
    let mut taker_cancelled = false;

    // Outer loop: walk opposite prices from best to worse.
    let mut cursor = None;
    'walk: while !order.remaining_quantity.is_zero() {
        let Some(price) = book.next_opposite_price(order.side, cursor) else {
            break;
        };
        if !crossing::incoming_crosses(order.side, order.limit_price, price) {
            break;
        }
        let maker_side = order.side.opposite();

        // Inner loop: FIFO within the level, indexed so skipped self orders
        // stay in place while deeper entries are consumed.
        let mut index = 0;
        loop {
            if order.remaining_quantity.is_zero() {
                break 'walk;
            }
            let Some(entry) = book.level_entry(maker_side, price, index) else {
                break;
            };

            let is_self = match (&order.user_id, &entry.user_id) {
                (Some(taker), Some(maker)) => taker == maker,
                _ => false,
            };
            if is_self {
                match policy {
                    SelfTradePolicy::Skip => {
                        debug!(order_id = %entry.order_id, "skipping own resting order");
                        index += 1;
                        continue;
                    }
                    SelfTradePolicy::CancelTaker => {
                        taker_cancelled = true;
                        break 'walk;
                    }
                    SelfTradePolicy::CancelMaker => {
                        if let Some(mut maker) = book.take_resting(&entry.order_id) {
                            maker.cancel(timestamp);
                            if maker.user_id.is_some() {
                                executor.release_lock(&maker.order_id)?;
                            }
                            events.push(Event::OrderUpdate(maker));
                        }
                        // The next entry shifted into this index.
                        continue;
                    }
                }
            }

            let quantity = order.remaining_quantity.min(entry.remaining);
            let fill = executor.execute_fill(
                book,
                order,
                entry.order_id,
                price,
                index,
                quantity,
                timestamp,
                events,
            )?;
            fills.push(fill);
            // A consumed maker left the queue, so the index already points
            // at the next entry; a partial maker means the taker is done.
        }

        // Level exhausted of matchable quantity; move to the next price.
        cursor = Some(price);
    }

    finalize_tif(book, order, &fills, taker_cancelled, timestamp)?;
    Ok(fills)
}

/// Apply time-in-force to whatever the walk left over.
fn finalize_tif(
    book: &mut OrderBook,
    order: &mut Order,
    fills: &[Fill],
    taker_cancelled: bool,
    timestamp: i64,
) -> Result<(), EngineError> {
    if taker_cancelled {
        // Self-cross under cancel-taker: the incoming remainder dies.
        if fills.is_empty() {
            order.cancel(timestamp);
        }
        return Ok(());
    }

    if order.remaining_quantity.is_zero() {
        debug_assert_eq!(order.status, OrderStatus::Filled);
        return Ok(());
    }

    match order.time_in_force {
        TimeInForce::Gtc => {
            order.mark_open(timestamp);
            book.rest_order(order.clone());
            Ok(())
        }
        TimeInForce::Ioc => {
            if fills.is_empty() {
                order.reject(timestamp);
                return Err(EngineError::UnfulfillableTif {
                    reason: "IOC executed no quantity".to_string(),
                });
            }
            // Partial IOC: the remainder is discarded, never rested.
            Ok(())
        }
        TimeInForce::Fok => {
            // The dry run guaranteed full execution.
            Err(EngineError::Invariant {
                context: format!("FOK order {} left a remainder after its dry run", order.order_id),
            })
        }
    }
}
