//! TLS 1.2 PRF (RFC 5246 §5): `PRF(secret, label, seed, n) = P_hash(secret, label‖seed)`
//! truncated to `n` bytes, where the hash is HMAC-SHA256 or HMAC-SHA384
//! depending on the negotiated ciphersuite.

use hmac::{Hmac, Mac};
use digest::KeyInit;
use sha2::{Sha256, Sha384};

use crate::ciphersuite::PrfHash;

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;

pub const MASTER_SECRET_LABEL: &[u8] = b"master secret";
pub const KEY_EXPANSION_LABEL: &[u8] = b"key expansion";
pub const CLIENT_FINISHED_LABEL: &[u8] = b"client finished";
pub const SERVER_FINISHED_LABEL: &[u8] = b"server finished";

/// `A(0) = label‖seed`, `A(i) = HMAC(secret, A(i-1))`. Output is the
/// concatenation of `HMAC(secret, A(i)‖label‖seed)` for `i = 1, 2, ...`
/// until at least `n` bytes have been produced, then truncated.
pub fn prf(hash: PrfHash, secret: &[u8], label: &[u8], seed: &[u8], n: usize) -> Vec<u8> {
    match hash {
        PrfHash::Sha256 => p_hash::<HmacSha256>(secret, label, seed, n),
        PrfHash::Sha384 => p_hash::<HmacSha384>(secret, label, seed, n),
    }
}

fn p_hash<M: Mac + Clone + KeyInit>(secret: &[u8], label: &[u8], seed: &[u8], n: usize) -> Vec<u8> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    let mut out = Vec::with_capacity(n + 64);
    let mut a = label_seed.clone();

    while out.len() < n {
        let mut mac_a = <M as Mac>::new_from_slice(secret).expect("HMAC accepts any key length");
        mac_a.update(&a);
        a = mac_a.finalize().into_bytes().to_vec();

        let mut mac_out =
            <M as Mac>::new_from_slice(secret).expect("HMAC accepts any key length");
        mac_out.update(&a);
        mac_out.update(&label_seed);
        out.extend_from_slice(&mac_out.finalize().into_bytes());
    }

    out.truncate(n);
    out
}
