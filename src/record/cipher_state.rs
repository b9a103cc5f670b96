//! `ConnectionState` (§3): one cipher epoch's keys, sequence numbers and
//! ciphersuite descriptor. A connection juggles up to three of these at
//! once — `current`, `pending`, and the transient `read_current` — see
//! `CipherStates` below.

use zeroize::Zeroize;

use crate::ciphersuite::{CipherMode, CipherSuite};
use crate::primitives::aes_block::AesKey;
use crate::primitives::gcm::GcmKey;

/// One direction's symmetric material, already partitioned out of the key
/// block (§4.5 "Key expansion").
#[derive(Debug)]
pub struct DirectionKeys {
    pub mac: Vec<u8>,
    pub key: Vec<u8>,
    /// 4-byte salt for GCM, empty for CBC (whose IV is random per record).
    pub iv: Vec<u8>,
}

impl DirectionKeys {
    fn zero(mac_len: usize, key_len: usize, iv_len: usize) -> Self {
        DirectionKeys {
            mac: vec![0u8; mac_len],
            key: vec![0u8; key_len],
            iv: vec![0u8; iv_len],
        }
    }
}

impl Drop for DirectionKeys {
    fn drop(&mut self) {
        self.mac.zeroize();
        self.key.zeroize();
        self.iv.zeroize();
    }
}

#[derive(Debug)]
pub struct ConnectionState {
    pub suite: &'static CipherSuite,
    pub write: DirectionKeys,
    pub read: DirectionKeys,
    pub write_seq: u64,
    pub read_seq: u64,
}

impl ConnectionState {
    /// The null-cipher epoch every connection starts in.
    pub fn initial(suite: &'static CipherSuite) -> Self {
        ConnectionState {
            suite,
            write: DirectionKeys::zero(0, 0, 0),
            read: DirectionKeys::zero(0, 0, 0),
            write_seq: 0,
            read_seq: 0,
        }
    }

    /// Builds the pending state from a freshly expanded key block
    /// (§4.5 "Partition as client_mac‖server_mac‖client_key‖server_key‖client_iv‖server_iv").
    /// The client always writes with the client_* values.
    pub fn from_key_block(suite: &'static CipherSuite, key_block: &[u8]) -> Self {
        let mac_len = suite.mac_len;
        let key_len = suite.key_len;
        let iv_len = suite.fixed_iv_len;

        let mut off = 0;
        let client_mac = key_block[off..off + mac_len].to_vec();
        off += mac_len;
        let server_mac = key_block[off..off + mac_len].to_vec();
        off += mac_len;
        let client_key = key_block[off..off + key_len].to_vec();
        off += key_len;
        let server_key = key_block[off..off + key_len].to_vec();
        off += key_len;
        let client_iv = key_block[off..off + iv_len].to_vec();
        off += iv_len;
        let server_iv = key_block[off..off + iv_len].to_vec();

        ConnectionState {
            suite,
            write: DirectionKeys {
                mac: client_mac,
                key: client_key,
                iv: client_iv,
            },
            read: DirectionKeys {
                mac: server_mac,
                key: server_key,
                iv: server_iv,
            },
            write_seq: 0,
            read_seq: 0,
        }
    }

    pub fn write_aes_key(&self) -> AesKey {
        AesKey::from_slice(&self.write.key)
    }

    pub fn read_aes_key(&self) -> AesKey {
        AesKey::from_slice(&self.read.key)
    }

    pub fn write_gcm_key(&self) -> GcmKey {
        GcmKey::new(&self.write.key)
    }

    pub fn read_gcm_key(&self) -> GcmKey {
        GcmKey::new(&self.read.key)
    }

    pub fn is_active(&self) -> bool {
        self.suite.mode != CipherMode::Null
    }
}

/// Holds the `current`/`pending`/`read_current` triple from §3 and enforces
/// that `current` is only ever mutated through a ChangeCipherSpec
/// transition.
pub struct CipherStates {
    pub current: ConnectionState,
    pub pending: Option<ConnectionState>,
    /// Set only in the window after we've sent our ChangeCipherSpec but
    /// before the peer's has arrived: the direction we now *write* with
    /// differs from the one we still *read* with.
    pub read_current: Option<ConnectionState>,
}

impl CipherStates {
    pub fn new(null_suite: &'static CipherSuite) -> Self {
        CipherStates {
            current: ConnectionState::initial(null_suite),
            pending: None,
            read_current: None,
        }
    }

    /// Activates the pending state for writing (our ChangeCipherSpec) and
    /// stashes the old `current` as `read_current`, so reads keep using it
    /// until the peer's own ChangeCipherSpec arrives.
    pub fn activate_write(&mut self) {
        let pending = self.pending.take().expect("pending state must exist");
        let old_current = std::mem::replace(&mut self.current, pending);
        self.read_current = Some(old_current);
    }

    /// Activates the pending state for reading, once the peer's
    /// ChangeCipherSpec arrives. If we're still mid false-start (no
    /// `read_current` stashed — i.e. we haven't sent our own CCS yet),
    /// `current` is swapped directly instead.
    pub fn activate_read(&mut self, pending_if_not_yet_current: Option<ConnectionState>) {
        if let Some(rc) = self.read_current.take() {
            // current already holds the post-CCS write state; rc holds the
            // pre-CCS state reads were still using.
            drop(rc);
        } else if let Some(pending) = pending_if_not_yet_current {
            self.current = pending;
        }
        self.current.read_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphersuite::SUPPORTED;

    #[test]
    fn key_block_partitioning_matches_lengths() {
        let suite = SUPPORTED.iter().find(|s| s.mac_len == 20).unwrap();
        let total = 2 * suite.mac_len + 2 * suite.key_len + 2 * suite.fixed_iv_len;
        let key_block: Vec<u8> = (0..total as u32).map(|i| i as u8).collect();
        let state = ConnectionState::from_key_block(suite, &key_block);
        assert_eq!(state.write.mac.len(), suite.mac_len);
        assert_eq!(state.read.mac.len(), suite.mac_len);
        assert_eq!(state.write.key.len(), suite.key_len);
        assert_eq!(state.write.iv.len(), suite.fixed_iv_len);
        assert_ne!(state.write.mac, state.read.mac);
    }

    #[test]
    fn sequence_numbers_start_at_zero_and_reset_on_activation() {
        let suite = &SUPPORTED[0];
        let mut cs = CipherStates::new(suite);
        cs.current.write_seq = 42;
        cs.current.read_seq = 7;
        let pending = ConnectionState::initial(suite);
        cs.pending = Some(pending);
        cs.activate_write();
        assert_eq!(cs.current.write_seq, 0);
        cs.activate_read(None);
        assert_eq!(cs.current.read_seq, 0);
    }
}
