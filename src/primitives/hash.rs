//! Incremental hashes and the running transcript digests the handshake
//! keeps in parallel (§3 `HandshakeData`, §9 "Transcript hash duplication").
//!
//! `sha1`/`sha2` digests are cheap to `Clone`, so unlike the design note's
//! no-clone fallback, a single instance per hash family is kept and cloned
//! whenever a point-in-time digest is needed without disturbing the running
//! state — the "implementation freedom" the design notes call out.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// One of the hash families the handshake ever needs as a running
/// transcript: SHA-1 for CertificateVerify, SHA-256/384 for the PRF
/// transcripts, SHA-512 reserved for future signature_algorithms entries
/// this client advertises but the handshake engine does not itself hash
/// with.
#[derive(Clone)]
pub enum TranscriptHash {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl TranscriptHash {
    pub fn new_sha1() -> Self {
        TranscriptHash::Sha1(Sha1::new())
    }

    pub fn new_sha256() -> Self {
        TranscriptHash::Sha256(Sha256::new())
    }

    pub fn new_sha384() -> Self {
        TranscriptHash::Sha384(Sha384::new())
    }

    pub fn new_sha512() -> Self {
        TranscriptHash::Sha512(Sha512::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            TranscriptHash::Sha1(h) => h.update(data),
            TranscriptHash::Sha256(h) => h.update(data),
            TranscriptHash::Sha384(h) => h.update(data),
            TranscriptHash::Sha512(h) => h.update(data),
        }
    }

    /// Digest of everything fed in so far, without consuming the running state.
    pub fn clone_finalize(&self) -> Vec<u8> {
        match self {
            TranscriptHash::Sha1(h) => h.clone().finalize().to_vec(),
            TranscriptHash::Sha256(h) => h.clone().finalize().to_vec(),
            TranscriptHash::Sha384(h) => h.clone().finalize().to_vec(),
            TranscriptHash::Sha512(h) => h.clone().finalize().to_vec(),
        }
    }
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

pub fn sha384(data: &[u8]) -> [u8; 48] {
    let mut h = Sha384::new();
    h.update(data);
    h.finalize().into()
}

/// One-shot digest under a wire-negotiated hash algorithm (§4.5
/// "ServerKeyExchange" signature hash selection).
pub fn digest(alg: crate::primitives::sign::HashAlg, data: &[u8]) -> Vec<u8> {
    use crate::primitives::sign::HashAlg::*;
    let mut h = match alg {
        Sha1 => TranscriptHash::new_sha1(),
        Sha256 => TranscriptHash::new_sha256(),
        Sha384 => TranscriptHash::new_sha384(),
        Sha512 => TranscriptHash::new_sha512(),
    };
    h.update(data);
    h.clone_finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_finalize_does_not_disturb_running_state() {
        let mut t = TranscriptHash::new_sha256();
        t.update(b"hello ");
        let snapshot1 = t.clone_finalize();
        t.update(b"world");
        let snapshot2 = t.clone_finalize();

        let direct = sha256(b"hello world");
        assert_eq!(&snapshot2[..], &direct[..]);
        assert_ne!(snapshot1, snapshot2);
    }
}
