//! CSPRNG adapter (§4.1). Everything in this crate that needs randomness —
//! `client_random`, the CBC explicit IV, DHE/ECDHE private values, the
//! RSA PreMasterSecret padding — goes through here so a test build can
//! substitute a deterministic source (§8 "Handshake laws": bit-identical
//! output for identical randomness).

use rand_core::{CryptoRng, RngCore};

/// Anything that can fill a buffer with random bytes suitable for
/// cryptographic use. The default is `rand::rngs::OsRng`; tests substitute
/// a fixed byte stream to make handshake fixtures reproducible.
pub trait SecureRandom {
    fn fill(&mut self, buf: &mut [u8]);
}

pub struct OsRandom(rand::rngs::OsRng);

impl OsRandom {
    pub fn new() -> Self {
        OsRandom(rand::rngs::OsRng)
    }
}

impl Default for OsRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureRandom for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        self.0.fill_bytes(buf);
    }
}

// Bridges our trait to the `rand_core`/`elliptic-curve` ecosystem, which
// expects `RngCore + CryptoRng` directly (used for ECDHE ephemeral key
// generation via `p256`/`p384`/`p521`).
pub struct RngAdapter<'a>(pub &'a mut dyn SecureRandom);

impl<'a> RngCore for RngAdapter<'a> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.0.fill(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.0.fill(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0.fill(dest);
        Ok(())
    }
}

impl<'a> CryptoRng for RngAdapter<'a> {}

#[cfg(test)]
pub struct FixedRandom {
    pub bytes: Vec<u8>,
    pub pos: usize,
}

#[cfg(test)]
impl FixedRandom {
    pub fn new(bytes: Vec<u8>) -> Self {
        FixedRandom { bytes, pos: 0 }
    }

    pub fn repeating(byte: u8) -> Self {
        FixedRandom {
            bytes: vec![byte; 4096],
            pos: 0,
        }
    }
}

#[cfg(test)]
impl SecureRandom for FixedRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.bytes[self.pos % self.bytes.len()];
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_random_is_deterministic_and_repeats() {
        let mut a = FixedRandom::new(vec![1, 2, 3]);
        let mut buf = [0u8; 7];
        a.fill(&mut buf);
        assert_eq!(buf, [1, 2, 3, 1, 2, 3, 1]);
    }
}
