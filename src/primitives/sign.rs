//! Signature verification and signing dispatch (§4.1, §9 "CertificateVerify
//! signer dispatch is similarly a tagged variant"). `ServerKeyExchange` and
//! certificate-chain signatures are always verify-only; `CertificateVerify`
//! additionally needs RSA/DSA signing for client authentication. ECDSA
//! client auth is out of scope (§9) — only RSA-SHA1 and DSA-SHA1 sign.

use dsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use rsa::signature::SignatureEncoding;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::primitives::curve::NamedCurve;
use crate::primitives::rng::{RngAdapter, SecureRandom};

/// The hash/signature identifier pair carried on the wire alongside a
/// signature (§4.5 "explicit 2-byte hash/signature identifiers").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    fn rsa_padding(self) -> Pkcs1v15Sign {
        match self {
            HashAlg::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
            HashAlg::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
            HashAlg::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
            HashAlg::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        }
    }
}

/// A leaf or intermediate certificate's public key, in the form the chain
/// builder hands to signature verification.
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Dsa(dsa::VerifyingKey),
    EcdsaP256(p256::ecdsa::VerifyingKey),
    EcdsaP384(p384::ecdsa::VerifyingKey),
}

/// Verifies `signature` over `digest` (already hashed with `hash_alg`)
/// using `public_key`. A curve/key-type mismatch against the signature
/// algorithm the wire identifier claims is the caller's job (§4.5
/// "mismatches are `illegal_parameter`").
pub fn verify(public_key: &PublicKey, hash_alg: HashAlg, digest: &[u8], signature: &[u8]) -> bool {
    match public_key {
        PublicKey::Rsa(key) => key
            .verify(hash_alg.rsa_padding(), digest, signature)
            .is_ok(),
        PublicKey::Dsa(key) => match dsa::Signature::try_from(signature) {
            Ok(sig) => key.verify_prehash(digest, &sig).is_ok(),
            Err(_) => false,
        },
        PublicKey::EcdsaP256(key) => match p256::ecdsa::Signature::from_der(signature) {
            Ok(sig) => {
                use p256::ecdsa::signature::hazmat::PrehashVerifier;
                key.verify_prehash(digest, &sig).is_ok()
            }
            Err(_) => false,
        },
        PublicKey::EcdsaP384(key) => match p384::ecdsa::Signature::from_der(signature) {
            Ok(sig) => {
                use p384::ecdsa::signature::hazmat::PrehashVerifier;
                key.verify_prehash(digest, &sig).is_ok()
            }
            Err(_) => false,
        },
    }
}

/// RSA PKCS#1 v1.5 encryption of a PreMasterSecret under the server's
/// public key (§4.5 "ClientKeyExchange content — RSA").
pub fn rsa_pkcs1_encrypt(
    public_key: &RsaPublicKey,
    plaintext: &[u8],
    rng: &mut dyn SecureRandom,
) -> Vec<u8> {
    let mut adapter = RngAdapter(rng);
    public_key
        .encrypt(&mut adapter, rsa::Pkcs1v15Encrypt, plaintext)
        .expect("RSA encryption of a 48-byte PreMasterSecret does not fail")
}

/// Signs `digest` (already SHA-1 hashed) with the client's RSA private key,
/// for CertificateVerify with a `rsa_pkcs1_sha1` signature algorithm.
pub fn rsa_pkcs1_sign_sha1(
    private_key: &RsaPrivateKey,
    digest: &[u8],
    rng: &mut dyn SecureRandom,
) -> Vec<u8> {
    let mut adapter = RngAdapter(rng);
    private_key
        .sign_with_rng(&mut adapter, HashAlg::Sha1.rsa_padding(), digest)
        .expect("signing a fixed-size SHA-1 digest does not fail")
}

/// Signs `digest` (already SHA-1 hashed) with the client's DSA private key.
pub fn dsa_sign_sha1(
    private_key: &dsa::SigningKey,
    digest: &[u8],
    rng: &mut dyn SecureRandom,
) -> Vec<u8> {
    let mut adapter = RngAdapter(rng);
    let sig: dsa::Signature = private_key
        .sign_prehash_with_rng(&mut adapter, digest)
        .expect("DSA signing over a fixed-size SHA-1 digest does not fail");
    sig.to_vec()
}

/// Curve for an ECDSA public key found in a certificate, used to dispatch
/// `PublicKey::EcdsaP256`/`EcdsaP384` construction in the chain builder.
pub fn ecdsa_curve_for(curve: NamedCurve) -> Option<()> {
    match curve {
        NamedCurve::Secp256r1 | NamedCurve::Secp384r1 => Some(()),
        NamedCurve::Secp521r1 => None,
    }
}

/// The client's own authentication key, used only for CertificateVerify
/// (§4.5 "RSA-PKCS1-v1.5 with SHA-1 or DSA with SHA-1; ECDSA omitted",
/// §9 "tagged variant {RSA-SHA1, DSA-SHA1}").
pub enum ClientSigningKey {
    Rsa(RsaPrivateKey),
    Dsa(dsa::SigningKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSignatureKind {
    Rsa,
    Dsa,
}

/// Signs the CertificateVerify SHA-1 transcript digest, dispatching on the
/// configured client key.
pub fn sign_certificate_verify(
    key: &ClientSigningKey,
    sha1_digest: &[u8],
    rng: &mut dyn SecureRandom,
) -> (ClientSignatureKind, Vec<u8>) {
    match key {
        ClientSigningKey::Rsa(private) => (
            ClientSignatureKind::Rsa,
            rsa_pkcs1_sign_sha1(private, sha1_digest, rng),
        ),
        ClientSigningKey::Dsa(private) => (
            ClientSignatureKind::Dsa,
            dsa_sign_sha1(private, sha1_digest, rng),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::rng::FixedRandom;
    use rsa::traits::PublicKeyParts;

    fn test_rsa_key() -> (RsaPrivateKey, RsaPublicKey) {
        // A small key is fine for exercising the signing/verification
        // plumbing; real certificates carry 2048+ bit keys.
        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn rsa_sign_sha1_then_verify() {
        let (private, public) = test_rsa_key();
        let digest = crate::primitives::hash::sha256(b"transcript bytes");
        let mut rng = FixedRandom::repeating(0xAB);
        let sig = rsa_pkcs1_sign_sha1(&private, &digest[..20], &mut rng);
        assert!(verify(
            &PublicKey::Rsa(public),
            HashAlg::Sha1,
            &digest[..20],
            &sig
        ));
    }

    #[test]
    fn rsa_pkcs1_encrypt_changes_ciphertext_each_call() {
        let (_, public) = test_rsa_key();
        assert!(public.size() >= 128);
        let mut rng_a = FixedRandom::repeating(1);
        let mut rng_b = FixedRandom::repeating(2);
        let a = rsa_pkcs1_encrypt(&public, &[0u8; 48], &mut rng_a);
        let b = rsa_pkcs1_encrypt(&public, &[0u8; 48], &mut rng_b);
        assert_ne!(a, b);
    }
}
