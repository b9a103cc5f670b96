//! AES block primitives (§4.1): a fixed-key single-block ECB encrypt, and
//! AES-CBC encrypt/decrypt with an explicit IV and no padding of its own
//! (the record codec, §4.3, does its own MAC-then-pad framing before
//! calling into CBC).

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

/// AES key, either 128 or 256 bit — the two lengths `ciphersuite.rs` uses.
pub enum AesKey {
    Aes128([u8; 16]),
    Aes256([u8; 32]),
}

impl AesKey {
    pub fn from_slice(key: &[u8]) -> Self {
        match key.len() {
            16 => {
                let mut k = [0u8; 16];
                k.copy_from_slice(key);
                AesKey::Aes128(k)
            }
            32 => {
                let mut k = [0u8; 32];
                k.copy_from_slice(key);
                AesKey::Aes256(k)
            }
            other => panic!("unsupported AES key length: {other}"),
        }
    }
}

/// Single-block AES-ECB encrypt, used by the GCM counter-mode keystream.
/// `aes-gcm` does this internally for us, but the adapter is kept as its
/// own primitive per §4.1's interface list.
pub fn ecb_encrypt_block(key: &AesKey, block: &mut [u8; 16]) {
    let mut ga = GenericArray::clone_from_slice(block);
    match key {
        AesKey::Aes128(k) => Aes128::new(GenericArray::from_slice(k)).encrypt_block(&mut ga),
        AesKey::Aes256(k) => Aes256::new(GenericArray::from_slice(k)).encrypt_block(&mut ga),
    }
    block.copy_from_slice(&ga);
}

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypts `data` in place under AES-CBC. `data.len()` must already be a
/// multiple of the block size (the caller has appended MAC + padding).
pub fn cbc_encrypt(key: &AesKey, iv: &[u8; 16], data: &mut [u8]) {
    match key {
        AesKey::Aes128(k) => {
            let enc = Aes128CbcEnc::new(k.into(), iv.into());
            encrypt_blocks_in_place(enc, data);
        }
        AesKey::Aes256(k) => {
            let enc = Aes256CbcEnc::new(k.into(), iv.into());
            encrypt_blocks_in_place(enc, data);
        }
    }
}

pub fn cbc_decrypt(key: &AesKey, iv: &[u8; 16], data: &mut [u8]) {
    match key {
        AesKey::Aes128(k) => {
            let dec = Aes128CbcDec::new(k.into(), iv.into());
            decrypt_blocks_in_place(dec, data);
        }
        AesKey::Aes256(k) => {
            let dec = Aes256CbcDec::new(k.into(), iv.into());
            decrypt_blocks_in_place(dec, data);
        }
    }
}

fn encrypt_blocks_in_place<C: BlockEncryptMut>(mut cipher: C, data: &mut [u8]) {
    for block in data.chunks_exact_mut(16) {
        let ga = GenericArray::from_mut_slice(block);
        cipher.encrypt_block_mut(ga);
    }
}

fn decrypt_blocks_in_place<C: BlockDecryptMut>(mut cipher: C, data: &mut [u8]) {
    for block in data.chunks_exact_mut(16) {
        let ga = GenericArray::from_mut_slice(block);
        cipher.decrypt_block_mut(ga);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbc_round_trip() {
        let key = AesKey::from_slice(&[0x42u8; 16]);
        let iv = [0x24u8; 16];
        let mut data = b"0123456789abcdef0123456789abcdef".to_vec(); // 32 bytes, 2 blocks
        let original = data.clone();

        cbc_encrypt(&key, &iv, &mut data);
        assert_ne!(data, original);
        cbc_decrypt(&key, &iv, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn ecb_single_block_is_deterministic() {
        let key = AesKey::from_slice(&[1u8; 32]);
        let mut a = [7u8; 16];
        let mut b = [7u8; 16];
        ecb_encrypt_block(&key, &mut a);
        ecb_encrypt_block(&key, &mut b);
        assert_eq!(a, b);
        assert_ne!(a, [7u8; 16]);
    }
}
