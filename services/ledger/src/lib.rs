//! Trade Ledger
//!
//! The durable side of the core, behind interfaces the engine writes to:
//! - `TradeStore`: idempotent trade persistence keyed by trade id, with a
//!   bounded recent-trades list per pair and optional snapshot storage
//! - `Journal`: append-only checksummed event log in publication order
//! - `replay`: folds a journal back into fills and per-user balance deltas,
//!   which is how reconstruction is verified end to end
//!
//! Everything here is in-memory; real durability lives outside the core.

pub mod journal;
pub mod replay;
pub mod store;

pub use journal::{Journal, JournalEntry};
pub use store::{MemoryTradeStore, StoreError, TradeStore};
