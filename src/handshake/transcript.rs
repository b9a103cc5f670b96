//! Running transcript state for one handshake (§3 `HandshakeData`, §9
//! "Transcript hash duplication"). Two hash families (SHA-256, SHA-384) are
//! kept live until ServerHello fixes the PRF hash, at which point the
//! unused family is dropped; within the fixed family, `hash1` and `hash2`
//! diverge once the client Finished message is fed into `hash2` but not
//! `hash1`.

use crate::ciphersuite::PrfHash;
use crate::primitives::hash::TranscriptHash;

pub struct Transcript {
    hash1_sha256: Option<TranscriptHash>,
    hash1_sha384: Option<TranscriptHash>,
    hash2_sha256: Option<TranscriptHash>,
    hash2_sha384: Option<TranscriptHash>,
    sha1: TranscriptHash,
    fixed: Option<PrfHash>,
}

impl Transcript {
    pub fn new() -> Self {
        Transcript {
            hash1_sha256: Some(TranscriptHash::new_sha256()),
            hash1_sha384: Some(TranscriptHash::new_sha384()),
            hash2_sha256: Some(TranscriptHash::new_sha256()),
            hash2_sha384: Some(TranscriptHash::new_sha384()),
            sha1: TranscriptHash::new_sha1(),
            fixed: None,
        }
    }

    /// Feeds `data` into every live hash: both hash1/hash2 pairs (until
    /// fixed) and the SHA-1 CertificateVerify transcript.
    pub fn update(&mut self, data: &[u8]) {
        if let Some(h) = &mut self.hash1_sha256 {
            h.update(data);
        }
        if let Some(h) = &mut self.hash1_sha384 {
            h.update(data);
        }
        if let Some(h) = &mut self.hash2_sha256 {
            h.update(data);
        }
        if let Some(h) = &mut self.hash2_sha384 {
            h.update(data);
        }
        self.sha1.update(data);
    }

    /// Feeds `data` into hash2 only — used for the client Finished message,
    /// which must diverge hash1 and hash2 (§3).
    pub fn update_hash2_only(&mut self, data: &[u8]) {
        if let Some(h) = &mut self.hash2_sha256 {
            h.update(data);
        }
        if let Some(h) = &mut self.hash2_sha384 {
            h.update(data);
        }
    }

    /// Called once ServerHello selects the ciphersuite's PRF hash: drops
    /// the unused hash family.
    pub fn fix_prf_hash(&mut self, hash: PrfHash) {
        self.fixed = Some(hash);
        match hash {
            PrfHash::Sha256 => {
                self.hash1_sha384 = None;
                self.hash2_sha384 = None;
            }
            PrfHash::Sha384 => {
                self.hash1_sha256 = None;
                self.hash2_sha256 = None;
            }
        }
    }

    fn fixed_hash(&self) -> PrfHash {
        self.fixed
            .expect("ServerHello must fix the PRF hash before a transcript digest is read")
    }

    pub fn hash1_digest(&self) -> Vec<u8> {
        match self.fixed_hash() {
            PrfHash::Sha256 => self.hash1_sha256.as_ref().unwrap().clone_finalize(),
            PrfHash::Sha384 => self.hash1_sha384.as_ref().unwrap().clone_finalize(),
        }
    }

    pub fn hash2_digest(&self) -> Vec<u8> {
        match self.fixed_hash() {
            PrfHash::Sha256 => self.hash2_sha256.as_ref().unwrap().clone_finalize(),
            PrfHash::Sha384 => self.hash2_sha384.as_ref().unwrap().clone_finalize(),
        }
    }

    pub fn sha1_digest(&self) -> Vec<u8> {
        self.sha1.clone_finalize()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
