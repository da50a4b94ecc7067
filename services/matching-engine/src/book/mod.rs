//! Order book data structures
//!
//! Price-level FIFO queues, the per-side ladders, and the per-pair book
//! that owns them.

pub mod ask_book;
pub mod bid_book;
pub mod order_book;
pub mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use order_book::{MarketState, OrderBook};
pub use price_level::{LevelEntry, PriceLevel};
