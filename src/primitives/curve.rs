//! NIST curve arithmetic for ECDHE/ECDH key exchange (§4.1, §4.5). Returns
//! the shared secret's X coordinate and a serialised uncompressed public
//! point, exactly the two values the handshake engine needs.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::{CryptoRng, RngCore};

use crate::error::{AlertDescription, TlsError};

/// `curve_type == 0x03` named curves this client advertises and accepts
/// (§4.5 "ServerKeyExchange — ECDHE"); the wire values are the RFC 4492
/// NamedCurve IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCurve {
    Secp256r1,
    Secp384r1,
    Secp521r1,
}

impl NamedCurve {
    pub fn from_wire(id: u16) -> Option<Self> {
        match id {
            23 => Some(NamedCurve::Secp256r1),
            24 => Some(NamedCurve::Secp384r1),
            25 => Some(NamedCurve::Secp521r1),
            _ => None,
        }
    }

    pub fn wire_id(self) -> u16 {
        match self {
            NamedCurve::Secp256r1 => 23,
            NamedCurve::Secp384r1 => 24,
            NamedCurve::Secp521r1 => 25,
        }
    }

    /// Field element byte length, used to decompose/recompose uncompressed points.
    pub fn byte_len(self) -> usize {
        match self {
            NamedCurve::Secp256r1 => 32,
            NamedCurve::Secp384r1 => 48,
            NamedCurve::Secp521r1 => 66,
        }
    }

    /// Total uncompressed point encoding length: `0x04 ‖ X ‖ Y`.
    pub fn point_len(self) -> usize {
        1 + 2 * self.byte_len()
    }
}

/// An ephemeral (or static, for ECDH_*) key pair on one of the three curves.
pub enum EcKeyPair {
    P256(p256::ecdh::EphemeralSecret),
    P384(p384::ecdh::EphemeralSecret),
    P521(p521::ecdh::EphemeralSecret),
}

impl EcKeyPair {
    pub fn generate<R: RngCore + CryptoRng>(curve: NamedCurve, rng: &mut R) -> Self {
        match curve {
            NamedCurve::Secp256r1 => EcKeyPair::P256(p256::ecdh::EphemeralSecret::random(rng)),
            NamedCurve::Secp384r1 => EcKeyPair::P384(p384::ecdh::EphemeralSecret::random(rng)),
            NamedCurve::Secp521r1 => EcKeyPair::P521(p521::ecdh::EphemeralSecret::random(rng)),
        }
    }

    /// `0x04 ‖ X ‖ Y` — the form ClientKeyExchange/ServerKeyExchange carry.
    pub fn public_point_uncompressed(&self) -> Vec<u8> {
        match self {
            EcKeyPair::P256(sk) => sk.public_key().to_encoded_point(false).as_bytes().to_vec(),
            EcKeyPair::P384(sk) => sk.public_key().to_encoded_point(false).as_bytes().to_vec(),
            EcKeyPair::P521(sk) => sk.public_key().to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Performs ECDH against the peer's uncompressed point, returning the
    /// shared secret's X coordinate, left-padded to the curve's field length.
    pub fn shared_secret(&self, peer_point_uncompressed: &[u8]) -> crate::error::Result<Vec<u8>> {
        match self {
            EcKeyPair::P256(sk) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_point_uncompressed)
                    .map_err(|_| TlsError::local(AlertDescription::IllegalParameter))?;
                let shared = sk.diffie_hellman(&peer);
                Ok(shared.raw_secret_bytes().to_vec())
            }
            EcKeyPair::P384(sk) => {
                let peer = p384::PublicKey::from_sec1_bytes(peer_point_uncompressed)
                    .map_err(|_| TlsError::local(AlertDescription::IllegalParameter))?;
                let shared = sk.diffie_hellman(&peer);
                Ok(shared.raw_secret_bytes().to_vec())
            }
            EcKeyPair::P521(sk) => {
                let peer = p521::PublicKey::from_sec1_bytes(peer_point_uncompressed)
                    .map_err(|_| TlsError::local(AlertDescription::IllegalParameter))?;
                let shared = sk.diffie_hellman(&peer);
                Ok(shared.raw_secret_bytes().to_vec())
            }
        }
    }
}

/// Splits an uncompressed point `0x04‖X‖Y` into its X and Y halves,
/// validating the leading tag byte and total length (§4.5 "the point must
/// be uncompressed").
pub fn decompose_uncompressed_point(
    curve: NamedCurve,
    point: &[u8],
) -> crate::error::Result<(Vec<u8>, Vec<u8>)> {
    if point.len() != curve.point_len() || point[0] != 0x04 {
        return Err(TlsError::local(AlertDescription::DecodeError));
    }
    let n = curve.byte_len();
    Ok((point[1..1 + n].to_vec(), point[1 + n..1 + 2 * n].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::rng::{FixedRandom, RngAdapter};

    #[test]
    fn p256_ecdh_agrees_both_directions() {
        let mut rng_a = FixedRandom::new((0u8..=255).collect());
        let mut rng_b = FixedRandom::new((1u8..=255).collect());

        let a = EcKeyPair::generate(NamedCurve::Secp256r1, &mut RngAdapter(&mut rng_a));
        let b = EcKeyPair::generate(NamedCurve::Secp256r1, &mut RngAdapter(&mut rng_b));

        let a_pub = a.public_point_uncompressed();
        let b_pub = b.public_point_uncompressed();
        assert_eq!(a_pub.len(), NamedCurve::Secp256r1.point_len());
        assert_eq!(a_pub[0], 0x04);

        let secret_from_a = a.shared_secret(&b_pub).unwrap();
        let secret_from_b = b.shared_secret(&a_pub).unwrap();
        assert_eq!(secret_from_a, secret_from_b);
        assert_eq!(secret_from_a.len(), NamedCurve::Secp256r1.byte_len());
    }

    #[test]
    fn decompose_rejects_compressed_point() {
        let mut bad = vec![0x02u8];
        bad.extend(vec![0u8; 32]);
        assert!(decompose_uncompressed_point(NamedCurve::Secp256r1, &bad).is_err());
    }

    #[test]
    fn named_curve_wire_ids() {
        assert_eq!(NamedCurve::from_wire(23), Some(NamedCurve::Secp256r1));
        assert_eq!(NamedCurve::from_wire(24), Some(NamedCurve::Secp384r1));
        assert_eq!(NamedCurve::from_wire(25), Some(NamedCurve::Secp521r1));
        assert_eq!(NamedCurve::from_wire(99), None);
    }
}
