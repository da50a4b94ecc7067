//! Journal replay
//!
//! Folds a journal back into the fills it recorded and the per-user balance
//! deltas those fills imply. Replaying against a fresh state and comparing
//! with the live engine is how reconstruction is verified: fills must match
//! exactly, and each user's balance movement must equal the folded delta.

use std::collections::HashMap;

use rust_decimal::Decimal;
use types::ids::{Symbol, UserId};
use types::trade::Fill;

use crate::journal::{Journal, JournalError};

/// Journal entry label under which fills are recorded.
pub const TRADE_EVENT_TYPE: &str = "trade";

/// Net balance movement for one user on one pair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BalanceDelta {
    /// Σ bought quantity − Σ sold quantity.
    pub base: Decimal,
    /// Σ sell proceeds (net of fees) − Σ buy cost (incl. fees).
    pub quote: Decimal,
}

/// Everything reconstructed from one journal.
#[derive(Debug, Default)]
pub struct ReplayState {
    /// Fills in journal order, timestamps as originally assigned.
    pub fills: Vec<Fill>,
    /// Balance deltas keyed by (user, pair).
    pub deltas: HashMap<(UserId, Symbol), BalanceDelta>,
}

impl ReplayState {
    pub fn delta(&self, user: &UserId, symbol: &Symbol) -> BalanceDelta {
        self.deltas
            .get(&(user.clone(), symbol.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn apply(&mut self, fill: &Fill) {
        let cost = fill.notional();
        let qty = fill.quantity.as_decimal();

        if let Some(buyer) = &fill.buyer_user_id {
            let delta = self
                .deltas
                .entry((buyer.clone(), fill.trading_pair.clone()))
                .or_default();
            delta.base += qty;
            delta.quote -= cost + fill.buyer_fee;
        }
        if let Some(seller) = &fill.seller_user_id {
            let delta = self
                .deltas
                .entry((seller.clone(), fill.trading_pair.clone()))
                .or_default();
            delta.base -= qty;
            delta.quote += cost - fill.seller_fee;
        }
    }
}

/// Replay a journal into fills and balance deltas.
///
/// Entries other than trades (order updates, snapshots) are skipped; they
/// describe state the fills already determine.
pub fn replay(journal: &Journal) -> Result<ReplayState, JournalError> {
    let mut state = ReplayState::default();
    for entry in journal.read_all()? {
        if entry.event_type != TRADE_EVENT_TYPE {
            continue;
        }
        let fill: Fill = entry.decode()?;
        state.apply(&fill);
        state.fills.push(fill);
    }
    Ok(state)
}
