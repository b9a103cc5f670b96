//! The single mutable record buffer (§3 "Record buffer", §9 "Mutable
//! shared buffer"). One instance is owned exclusively by the `Connection`
//! and reused for the lifetime of the connection as both the decrypt
//! target and the encrypt staging area, avoiding a per-record allocation.

use crate::record::ContentType;

/// 5-byte header + max ciphertext fragment (2^14 + 2048).
pub const MAX_RECORD: usize = 5 + (1 << 14) + 2048;

pub struct RecordBuffer {
    pub data: Vec<u8>,
    pub read_start: usize,
    pub read_end: usize,
    pub packet_len: usize,
    pub plaintext_start: usize,
    pub plaintext_len: usize,
    pub content_type: ContentType,
}

impl RecordBuffer {
    pub fn new() -> Self {
        RecordBuffer {
            data: vec![0u8; MAX_RECORD],
            read_start: 0,
            read_end: 0,
            packet_len: 0,
            plaintext_start: 0,
            plaintext_len: 0,
            content_type: ContentType::Handshake,
        }
    }

    pub fn plaintext(&self) -> &[u8] {
        &self.data[self.plaintext_start..self.plaintext_start + self.plaintext_len]
    }
}

impl Default for RecordBuffer {
    fn default() -> Self {
        Self::new()
    }
}
