//! Matching Engine
//!
//! Central-limit-order-book core for the spot exchange: per-pair books with
//! price-time priority, limit/market × GTC/IOC/FOK matching, atomic
//! per-fill settlement through the risk gate, and ordered event publication.
//!
//! **Key invariants:**
//! - Price-time priority strictly enforced
//! - Deterministic matching (same inputs → same outputs)
//! - No self-trades; fill-or-kill executes all or nothing
//! - Conservation of quantity and of funds, modulo fees

pub mod book;
pub mod config;
pub mod delta;
pub mod engine;
pub mod events;
pub mod matching;
pub mod sink;

pub use config::{EngineConfig, SelfTradePolicy};
pub use engine::{CancelIntent, CancelResult, Engine, OrderResult};
pub use events::{Channel, Event, MarketStats, Snapshot};
pub use sink::{ChannelBuffer, EventSink};
