//! Arbitrary-precision modular exponentiation for DHE (§4.1, §4.5
//! "ClientKeyExchange content — DHE"). Values are big-endian byte strings
//! in and out, matching how `p`, `g`, `Ys` arrive on the wire.

use num_bigint::BigUint;

pub fn modpow(base: &[u8], exp: &[u8], modulus: &[u8]) -> Vec<u8> {
    let base = BigUint::from_bytes_be(base);
    let exp = BigUint::from_bytes_be(exp);
    let modulus = BigUint::from_bytes_be(modulus);
    base.modpow(&exp, &modulus).to_bytes_be()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_modpow() {
        // 4^13 mod 497 = 445 (textbook RSA example).
        let base = 4u32.to_be_bytes();
        let exp = 13u32.to_be_bytes();
        let modulus = 497u32.to_be_bytes();
        let result = modpow(&base, &exp, &modulus);
        let n = u32::from_be_bytes({
            let mut buf = [0u8; 4];
            buf[4 - result.len()..].copy_from_slice(&result);
            buf
        });
        assert_eq!(n, 445);
    }
}
