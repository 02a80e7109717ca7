//! The long-string table (GSO).
//!
//! `strL` payloads live out of line, after the data section. Each unique
//! payload is emitted once as a `GSO` record keyed by the (variable,
//! observation) pair that first produced it; later occurrences reference
//! the same key from their data-section field. Uniqueness is decided by
//! a SHA-256 content hash.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::codec::{ByteOrder, encode_u32, encode_u64};

/// Record marker bytes.
pub const GSO_MAGIC: &[u8; 3] = b"GSO";

/// Payload stored as raw binary.
pub const GSO_TYPE_BINARY: u8 = 129;

/// Payload stored as a NUL-terminated string; the stored length includes
/// the terminator.
pub const GSO_TYPE_CSTR: u8 = 130;

/// Reference key of a long-string payload: 1-based variable index and
/// 1-based observation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrlKey {
    pub variable: u32,
    pub observation: u64,
}

/// Content-addressed key table built while the data section is written.
#[derive(Debug, Default)]
pub struct StrlTable {
    by_hash: HashMap<String, StrlKey>,
    entries: Vec<(StrlKey, String)>,
}

impl StrlTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the key for a payload at (variable, observation), both
    /// 1-based. The first occurrence of a payload claims its own
    /// position as the key and queues a record for emission; repeats
    /// reuse the existing key.
    pub fn key_for(&mut self, variable: u32, observation: u64, payload: &str) -> StrlKey {
        let hash = content_hash(payload.as_bytes());
        if let Some(&key) = self.by_hash.get(&hash) {
            return key;
        }
        let key = StrlKey {
            variable,
            observation,
        };
        self.by_hash.insert(hash, key);
        self.entries.push((key, payload.to_string()));
        key
    }

    /// Records to emit, in first-occurrence order.
    pub fn entries(&self) -> &[(StrlKey, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hex SHA-256 of a payload.
pub fn content_hash(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Encode one GSO record: marker, u32 variable, u64 observation, type
/// byte, u32 length, payload (NUL-terminated).
pub fn encode_record(order: ByteOrder, key: StrlKey, payload: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(GSO_MAGIC.len() + 17 + payload.len() + 1);
    buf.extend_from_slice(GSO_MAGIC);
    buf.extend_from_slice(&encode_u32(order, key.variable));
    buf.extend_from_slice(&encode_u64(order, key.observation));
    buf.push(GSO_TYPE_CSTR);
    buf.extend_from_slice(&encode_u32(order, payload.len() as u32 + 1));
    buf.extend_from_slice(payload.as_bytes());
    buf.push(0);
    buf
}
