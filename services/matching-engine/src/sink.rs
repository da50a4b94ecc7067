//! Event sink
//!
//! The engine emits events into a sink; transports pull from it and fan
//! out. There is no callback path back into the engine — a slow or failing
//! subscriber can at worst make the sink report unavailability, which the
//! engine answers with bounded retries and, if those fail, by degrading the
//! pair.

use std::collections::VecDeque;

use dashmap::DashMap;
use thiserror::Error;

use crate::events::{Channel, Event};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("event sink unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Transport-agnostic event sink.
pub trait EventSink: Send + Sync {
    fn publish(&self, channel: &Channel, event: &Event) -> Result<(), SinkError>;
}

/// In-memory per-channel queues with subscriber-pull semantics.
///
/// Queues are bounded; when full, the oldest event is dropped in favor of
/// the newest, which matches reconnect-with-snapshot subscriber behavior.
pub struct ChannelBuffer {
    queues: DashMap<Channel, VecDeque<Event>>,
    capacity: usize,
}

impl ChannelBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            capacity,
        }
    }

    /// Drain everything queued on a channel, oldest first.
    pub fn drain(&self, channel: &Channel) -> Vec<Event> {
        self.queues
            .get_mut(channel)
            .map(|mut queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Number of events waiting on a channel.
    pub fn depth(&self, channel: &Channel) -> usize {
        self.queues.get(channel).map(|q| q.len()).unwrap_or(0)
    }
}

impl Default for ChannelBuffer {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl EventSink for ChannelBuffer {
    fn publish(&self, channel: &Channel, event: &Event) -> Result<(), SinkError> {
        let mut queue = self.queues.entry(channel.clone()).or_default();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::ids::{OrderId, Symbol, TradeId, UserId};
    use types::numeric::{Price, Quantity};
    use types::trade::{Fill, MatchType};

    fn trade_event(seq: u64) -> Event {
        Event::Trade(Fill {
            trade_id: TradeId::from_parts(1_708_123_456_789_000_000, seq),
            trading_pair: Symbol::new("BTC/USDT"),
            price: Price::from_u64(50_000),
            quantity: Quantity::from_str("0.1").unwrap(),
            buyer_order_id: OrderId::new(),
            seller_order_id: OrderId::new(),
            buyer_user_id: Some(UserId::new("alice")),
            seller_user_id: Some(UserId::new("bob")),
            buyer_fee: Decimal::ZERO,
            seller_fee: Decimal::ZERO,
            timestamp: 1_708_123_456_789_000_000,
            match_type: MatchType::Full,
        })
    }

    #[test]
    fn test_publish_then_drain_in_order() {
        let buffer = ChannelBuffer::default();
        let channel = Channel::TradesAll;

        buffer.publish(&channel, &trade_event(1)).unwrap();
        buffer.publish(&channel, &trade_event(2)).unwrap();
        assert_eq!(buffer.depth(&channel), 2);

        let drained = buffer.drain(&channel);
        assert_eq!(drained.len(), 2);
        match (&drained[0], &drained[1]) {
            (Event::Trade(first), Event::Trade(second)) => {
                assert!(first.trade_id.as_str() < second.trade_id.as_str());
            }
            _ => panic!("expected trade events"),
        }
        assert_eq!(buffer.depth(&channel), 0);
    }

    #[test]
    fn test_bounded_queue_drops_oldest() {
        let buffer = ChannelBuffer::new(2);
        let channel = Channel::TradesAll;
        for seq in 1..=3 {
            buffer.publish(&channel, &trade_event(seq)).unwrap();
        }
        let drained = buffer.drain(&channel);
        assert_eq!(drained.len(), 2);
        match &drained[0] {
            Event::Trade(fill) => assert!(fill.trade_id.as_str().ends_with("_2")),
            _ => panic!("expected trade"),
        }
    }

    #[test]
    fn test_channels_are_isolated() {
        let buffer = ChannelBuffer::default();
        buffer
            .publish(&Channel::TradesAll, &trade_event(1))
            .unwrap();
        assert_eq!(
            buffer.depth(&Channel::Trade {
                symbol: Symbol::new("BTC/USDT")
            }),
            0
        );
    }
}
