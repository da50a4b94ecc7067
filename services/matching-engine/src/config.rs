//! Engine configuration

use serde::{Deserialize, Serialize};
use types::fee::FeeSchedule;

/// What to do when an incoming order would match the same user's resting
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfTradePolicy {
    /// Skip the resting order and keep walking; the default.
    #[default]
    Skip,
    /// Cancel the incoming remainder at the first self-cross.
    CancelTaker,
    /// Cancel the resting order and keep matching.
    CancelMaker,
}

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fees: FeeSchedule,
    pub self_trade_policy: SelfTradePolicy,
    /// Snapshot depth per side.
    pub snapshot_depth: usize,
    /// Ledger write attempts per fill before the pair degrades.
    pub ledger_retry_limit: u32,
    /// Publish attempts per event before the pair degrades.
    pub publish_retry_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::free(),
            self_trade_policy: SelfTradePolicy::default(),
            snapshot_depth: 20,
            ledger_retry_limit: 3,
            publish_retry_limit: 3,
        }
    }
}
