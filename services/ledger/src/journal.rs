//! Append-only event journal with checksums
//!
//! Records every published event in publication order, one entry per event,
//! with a CRC32C over (sequence ++ timestamp ++ event_type ++ payload).
//! Sequences are assigned at append and must be replayed in order; a
//! checksum mismatch on read means the entry is corrupt.
//!
//! The journal is in-memory — durability is a collaborator concern — but the
//! entry format is stable so a durable implementation can share it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JournalError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("checksum mismatch at sequence {sequence}")]
    ChecksumMismatch { sequence: u64 },

    #[error("sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },
}

/// A single journal entry representing one published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Monotone per journal, assigned at append.
    pub sequence: u64,
    /// Engine-assigned event timestamp (unix nanos), carried for replay.
    pub timestamp: i64,
    /// Event type label from the event taxonomy.
    pub event_type: String,
    /// JSON-serialized event payload.
    pub payload: Vec<u8>,
    /// CRC32C over (sequence ++ timestamp ++ event_type ++ payload).
    pub checksum: u32,
}

impl JournalEntry {
    fn new(sequence: u64, timestamp: i64, event_type: String, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp, &event_type, &payload);
        Self {
            sequence,
            timestamp,
            event_type,
            payload,
            checksum,
        }
    }

    /// CRC32C over the concatenation of the entry's fields.
    pub fn compute_checksum(
        sequence: u64,
        timestamp: i64,
        event_type: &str,
        payload: &[u8],
    ) -> u32 {
        let mut buf = Vec::with_capacity(16 + event_type.len() + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(event_type.as_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    /// Validate the stored checksum against a recomputed value.
    pub fn verify_checksum(&self) -> bool {
        self.checksum
            == Self::compute_checksum(
                self.sequence,
                self.timestamp,
                &self.event_type,
                &self.payload,
            )
    }

    /// Deserialize the payload into a concrete event type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, JournalError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| JournalError::Serialization(e.to_string()))
    }
}

/// Append-only in-memory journal.
pub struct Journal {
    entries: Mutex<Vec<JournalEntry>>,
    next_sequence: AtomicU64,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Append a serializable event, returning its journal sequence.
    pub fn append<T: Serialize>(
        &self,
        event_type: &str,
        timestamp: i64,
        event: &T,
    ) -> Result<u64, JournalError> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| JournalError::Serialization(e.to_string()))?;
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let entry = JournalEntry::new(sequence, timestamp, event_type.to_string(), payload);
        self.entries
            .lock()
            .expect("journal mutex poisoned")
            .push(entry);
        Ok(sequence)
    }

    /// All entries in append order, verifying checksums and sequence
    /// contiguity.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let entries = self.entries.lock().expect("journal mutex poisoned").clone();
        let mut expected = 1u64;
        for entry in &entries {
            if !entry.verify_checksum() {
                return Err(JournalError::ChecksumMismatch {
                    sequence: entry.sequence,
                });
            }
            if entry.sequence != expected {
                return Err(JournalError::SequenceGap {
                    expected,
                    got: entry.sequence,
                });
            }
            expected += 1;
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("journal mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}
