//! Pre-trade risk validation
//!
//! The six checks run in a fixed order and the first failure is returned;
//! advisory conditions accumulate as warnings on a passing result. Nothing
//! here mutates state — the gate applies locks only after a pass.

use rust_decimal::Decimal;
use types::errors::RiskError;
use types::numeric::Price;
use types::order::{OrderIntent, OrderType, Side};
use types::position::UserPosition;
use types::risk::{RiskCheck, RiskLimits, RiskWarning};

/// Everything the checks need about the intent, resolved by the caller.
#[derive(Debug, Clone, Copy)]
pub struct CheckInput<'a> {
    pub intent: &'a OrderIntent,
    /// Reference mark for the price band: last trade, or an external mark.
    pub mark_price: Option<Price>,
    /// Quote required to admit the order. For limit buys this is
    /// qty × limit price; for market buys, best-ask × qty × (1 + slippage).
    pub required_quote: Decimal,
    pub now: i64,
}

/// Run the ordered pre-trade checks against one user position.
pub fn pre_trade_check(
    input: CheckInput<'_>,
    position: &UserPosition,
    limits: &RiskLimits,
) -> Result<RiskCheck, RiskError> {
    let mut check = RiskCheck::clean();
    let intent = input.intent;
    let qty = intent.quantity.as_decimal();

    // 1. Size bounds: per-order notional, then projected position notional.
    //    (Pair-level min/max quantity is the book's own validation.)
    let order_notional = order_notional(input);
    if order_notional > limits.max_order_notional {
        return Err(RiskError::OrderNotionalTooLarge {
            limit: limits.max_order_notional,
            got: order_notional,
        });
    }
    if intent.side == Side::Buy {
        if let Some(reference) = reference_price(input) {
            let projected = (position.total_base() + qty) * reference.as_decimal();
            if projected > limits.max_position_notional {
                return Err(RiskError::PositionLimitExceeded {
                    limit: limits.max_position_notional,
                    projected,
                });
            }
        }
    }

    // 2. Price band for limit orders, when a reference mark exists.
    if intent.order_type == OrderType::Limit {
        if let (Some(price), Some(mark)) = (intent.price, input.mark_price) {
            let deviation = price.deviation_from(mark);
            if deviation > limits.max_price_deviation {
                return Err(RiskError::PriceOutOfBand {
                    deviation,
                    limit: limits.max_price_deviation,
                });
            }
            if deviation < limits.min_price_deviation {
                check = check.warn(RiskWarning::PriceNearMark { deviation });
            }
        }
    }

    // 3. Open-order cap.
    if position.open_order_count >= limits.max_open_orders {
        return Err(RiskError::OpenOrderCapExceeded {
            limit: limits.max_open_orders,
        });
    }

    // 4. Daily volume cap.
    let projected_volume = position.daily_volume_at(input.now) + order_notional;
    if projected_volume > limits.max_daily_volume {
        return Err(RiskError::DailyVolumeExceeded {
            limit: limits.max_daily_volume,
            projected: projected_volume,
        });
    }

    // 5. Balance adequacy.
    match intent.side {
        Side::Buy => {
            if input.required_quote > position.quote_balance {
                return Err(RiskError::InsufficientBalance {
                    asset: intent.trading_pair.quote().to_string(),
                    required: input.required_quote,
                    available: position.quote_balance,
                });
            }
        }
        Side::Sell => {
            if qty > position.base_balance {
                return Err(RiskError::InsufficientBalance {
                    asset: intent.trading_pair.base().to_string(),
                    required: qty,
                    available: position.base_balance,
                });
            }
        }
    }

    // 6. Rate limit against the user's last accepted order.
    if position.last_order_time > 0 {
        let elapsed_ms = (input.now - position.last_order_time) / 1_000_000;
        if elapsed_ms < limits.min_order_interval_ms {
            return Err(RiskError::RateLimited {
                elapsed_ms,
                required_ms: limits.min_order_interval_ms,
            });
        }
        if elapsed_ms < limits.warn_order_interval_ms {
            check = check.warn(RiskWarning::FastOrderPacing { elapsed_ms });
        }
    }

    Ok(check)
}

/// Notional used for size and volume caps.
fn order_notional(input: CheckInput<'_>) -> Decimal {
    match input.intent.price {
        Some(price) => input.intent.quantity.as_decimal() * price.as_decimal(),
        // Market orders: the required-quote estimate already carries the
        // best-ask projection for buys; for sells fall back to the mark.
        None => match input.intent.side {
            Side::Buy => input.required_quote,
            Side::Sell => input
                .mark_price
                .map(|m| input.intent.quantity.as_decimal() * m.as_decimal())
                .unwrap_or(Decimal::ZERO),
        },
    }
}

/// Price used to project position notional.
fn reference_price(input: CheckInput<'_>) -> Option<Price> {
    input.intent.price.or(input.mark_price)
}
