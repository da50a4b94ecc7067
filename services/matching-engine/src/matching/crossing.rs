//! Crossing detection
//!
//! An incoming order is marketable against a resting price when its limit
//! crosses it; market orders (no limit) cross any price.

use types::numeric::Price;
use types::order::Side;

/// Whether an incoming order crosses a resting price.
///
/// `incoming_limit` of None means a market order.
pub fn incoming_crosses(
    incoming_side: Side,
    incoming_limit: Option<Price>,
    resting_price: Price,
) -> bool {
    match (incoming_side, incoming_limit) {
        (_, None) => true,
        (Side::Buy, Some(limit)) => limit >= resting_price,
        (Side::Sell, Some(limit)) => limit <= resting_price,
    }
}
