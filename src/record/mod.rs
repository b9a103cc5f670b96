//! Record codec (§4.3): packs/unpacks `TLSPlaintext`↔`TLSCiphertext`
//! with null/CBC/GCM protection, MAC, padding, and sequence numbers.

pub mod buffer;
pub mod cipher_state;

use byteorder::{BigEndian, ByteOrder};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};
use subtle::ConstantTimeEq;

use crate::ciphersuite::CipherMode;
use crate::error::{AlertDescription, Result, TlsError};
use crate::primitives::aes_block;
use crate::primitives::rng::SecureRandom;
use cipher_state::ConnectionState;

pub const TLS12_VERSION: [u8; 2] = [3, 3];
pub const MAX_PLAINTEXT: usize = 1 << 14;
pub const MAX_CIPHERTEXT_FRAGMENT: usize = (1 << 14) + 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
}

impl ContentType {
    pub fn code(self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => return None,
        })
    }
}

fn seq_bytes(seq: u64) -> [u8; 8] {
    let mut b = [0u8; 8];
    BigEndian::write_u64(&mut b, seq);
    b
}

/// MAC input / AEAD AAD prefix: `seq(8) ‖ type(1) ‖ version(2) ‖ length(2)`.
fn associated_data(seq: u64, content_type: ContentType, length: u16) -> [u8; 13] {
    let mut ad = [0u8; 13];
    ad[..8].copy_from_slice(&seq_bytes(seq));
    ad[8] = content_type.code();
    ad[9..11].copy_from_slice(&TLS12_VERSION);
    BigEndian::write_u16(&mut ad[11..13], length);
    ad
}

fn hmac_oneshot(mac_len: usize, key: &[u8], data: &[u8]) -> Vec<u8> {
    match mac_len {
        20 => {
            let mut m = <Hmac<sha1::Sha1> as Mac>::new_from_slice(key).unwrap();
            m.update(data);
            m.finalize().into_bytes().to_vec()
        }
        32 => {
            let mut m = <Hmac<Sha256> as Mac>::new_from_slice(key).unwrap();
            m.update(data);
            m.finalize().into_bytes().to_vec()
        }
        48 => {
            let mut m = <Hmac<Sha384> as Mac>::new_from_slice(key).unwrap();
            m.update(data);
            m.finalize().into_bytes().to_vec()
        }
        other => panic!("unsupported CBC MAC length: {other}"),
    }
}

/// Encrypts `plaintext` under `state`'s write keys and appends the
/// resulting record (header + fragment) to `out`. `plaintext.len()` must
/// already be within `MAX_PLAINTEXT` — splitting oversized application
/// writes is the connection controller's job (§4.6).
pub fn encode_record(
    state: &mut ConnectionState,
    content_type: ContentType,
    plaintext: &[u8],
    rng: &mut dyn SecureRandom,
    out: &mut Vec<u8>,
) {
    assert!(plaintext.len() <= MAX_PLAINTEXT);
    let seq = state.write_seq;

    let fragment = match state.suite.mode {
        CipherMode::Null => plaintext.to_vec(),
        CipherMode::Cbc => {
            let block_len = state.suite.block_len;
            let ad = associated_data(seq, content_type, plaintext.len() as u16);
            let mac_len = state.suite.mac_len;
            let mut mac_input = Vec::with_capacity(ad.len() + plaintext.len());
            mac_input.extend_from_slice(&ad);
            mac_input.extend_from_slice(plaintext);
            let mac = hmac_oneshot(mac_len, &state.write.mac, &mac_input);

            let unpadded_len = plaintext.len() + mac_len + 1;
            let pad_len = (block_len - (unpadded_len % block_len)) % block_len;

            let mut payload = Vec::with_capacity(plaintext.len() + mac_len + pad_len + 1);
            payload.extend_from_slice(plaintext);
            payload.extend_from_slice(&mac);
            payload.extend(std::iter::repeat(pad_len as u8).take(pad_len + 1));

            let mut iv = vec![0u8; block_len];
            rng.fill(&mut iv);
            let mut iv_arr = [0u8; 16];
            iv_arr.copy_from_slice(&iv);

            let key = state.write_aes_key();
            aes_block::cbc_encrypt(&key, &iv_arr, &mut payload);

            let mut fragment = iv;
            fragment.extend_from_slice(&payload);
            fragment
        }
        CipherMode::Gcm => {
            let ad = associated_data(seq, content_type, plaintext.len() as u16);
            let explicit_nonce = seq_bytes(seq);
            let mut nonce = [0u8; 12];
            nonce[..4].copy_from_slice(&state.write.iv);
            nonce[4..].copy_from_slice(&explicit_nonce);

            let mut buf = plaintext.to_vec();
            let key = state.write_gcm_key();
            let tag = key.seal_in_place(&nonce, &ad, &mut buf);

            let mut fragment = Vec::with_capacity(8 + buf.len() + 16);
            fragment.extend_from_slice(&explicit_nonce);
            fragment.extend_from_slice(&buf);
            fragment.extend_from_slice(&tag);
            fragment
        }
    };

    out.push(content_type.code());
    out.extend_from_slice(&TLS12_VERSION);
    out.extend_from_slice(&(fragment.len() as u16).to_be_bytes());
    out.extend_from_slice(&fragment);

    state.write_seq += 1;
}

/// Decrypts `fragment` (the record body, header already stripped) under
/// `state`'s read keys. Returns the plaintext on success; every failure
/// mode collapses to `bad_record_mac` per §4.3's constant-time posture.
pub fn decode_record(
    state: &mut ConnectionState,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>> {
    if fragment.len() > MAX_CIPHERTEXT_FRAGMENT {
        return Err(TlsError::local(AlertDescription::RecordOverflow));
    }

    let seq = state.read_seq;

    let plaintext = match state.suite.mode {
        CipherMode::Null => fragment.to_vec(),
        CipherMode::Cbc => decode_cbc(state, seq, content_type, fragment)?,
        CipherMode::Gcm => decode_gcm(state, seq, content_type, fragment)?,
    };

    state.read_seq += 1;
    Ok(plaintext)
}

fn decode_cbc(
    state: &ConnectionState,
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>> {
    let block_len = state.suite.block_len;
    let mac_len = state.suite.mac_len;

    if fragment.len() < block_len + mac_len + 1
        || (fragment.len() - block_len) % block_len != 0
    {
        return Err(TlsError::local(AlertDescription::BadRecordMac));
    }

    let mut iv = [0u8; 16];
    iv.copy_from_slice(&fragment[..block_len]);
    let mut payload = fragment[block_len..].to_vec();

    let key = state.read_aes_key();
    aes_block::cbc_decrypt(&key, &iv, &mut payload);

    let stated_pad_len = *payload.last().expect("non-empty, checked above") as usize;
    let max_pad_len = payload.len().saturating_sub(1).saturating_sub(mac_len);
    let padding_fail = stated_pad_len > max_pad_len;
    let pad_len = if padding_fail { 0 } else { stated_pad_len };

    let plaintext_len = payload.len() - mac_len - pad_len - 1;
    let plaintext = &payload[..plaintext_len];
    let received_mac = &payload[plaintext_len..plaintext_len + mac_len];
    let padding = &payload[plaintext_len + mac_len..];

    let ad = associated_data(seq, content_type, plaintext_len as u16);
    let mut mac_input = Vec::with_capacity(ad.len() + plaintext_len);
    mac_input.extend_from_slice(&ad);
    mac_input.extend_from_slice(plaintext);
    let expected_mac = hmac_oneshot(mac_len, &state.read.mac, &mac_input);

    let mac_ok: bool = expected_mac.ct_eq(received_mac).into();
    let padding_ok = padding.iter().all(|&b| b == pad_len as u8);

    if !mac_ok || !padding_ok || padding_fail {
        return Err(TlsError::local(AlertDescription::BadRecordMac));
    }

    Ok(plaintext.to_vec())
}

fn decode_gcm(
    state: &ConnectionState,
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>> {
    if fragment.len() < 8 + 16 {
        return Err(TlsError::local(AlertDescription::BadRecordMac));
    }
    let explicit_nonce = &fragment[..8];
    let ciphertext = &fragment[8..fragment.len() - 16];
    let mut tag = [0u8; 16];
    tag.copy_from_slice(&fragment[fragment.len() - 16..]);

    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(&state.read.iv);
    nonce[4..].copy_from_slice(explicit_nonce);

    let ad = associated_data(seq, content_type, ciphertext.len() as u16);
    let mut buf = ciphertext.to_vec();
    let key = state.read_gcm_key();
    key.open_in_place(&nonce, &ad, &mut buf, &tag)
        .map_err(|_| TlsError::local(AlertDescription::BadRecordMac))?;
    Ok(buf)
}

/// Packs a 5-byte record header for `content_type`/`fragment_len`, used by
/// callers that stream the fragment separately rather than through
/// `encode_record`.
pub fn write_header(content_type: ContentType, fragment_len: u16, out: &mut [u8; 5]) {
    out[0] = content_type.code();
    out[1..3].copy_from_slice(&TLS12_VERSION);
    BigEndian::write_u16(&mut out[3..5], fragment_len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphersuite::SUPPORTED;
    use crate::primitives::rng::FixedRandom;

    fn cbc_suite() -> &'static crate::ciphersuite::CipherSuite {
        SUPPORTED.iter().find(|s| s.mac_len == 20).unwrap()
    }

    fn gcm_suite() -> &'static crate::ciphersuite::CipherSuite {
        SUPPORTED
            .iter()
            .find(|s| s.mac_len == 0 && s.key_len == 16)
            .unwrap()
    }

    fn keyed_state(suite: &'static crate::ciphersuite::CipherSuite) -> ConnectionState {
        let total = 2 * suite.mac_len + 2 * suite.key_len + 2 * suite.fixed_iv_len;
        let key_block: Vec<u8> = (0..total as u32).map(|i| (i * 7 + 3) as u8).collect();
        ConnectionState::from_key_block(suite, &key_block)
    }

    #[test]
    fn cbc_round_trip_all_lengths() {
        for len in [0usize, 1, 15, 16, 17, 255, 1000] {
            let mut state = keyed_state(cbc_suite());
            let mut rng = FixedRandom::repeating(0x11);
            let plaintext: Vec<u8> = (0..len as u32).map(|i| i as u8).collect();
            let mut wire = Vec::new();
            encode_record(&mut state, ContentType::ApplicationData, &plaintext, &mut rng, &mut wire);

            let fragment = &wire[5..];
            let mut state2 = keyed_state(cbc_suite());
            let decoded =
                decode_record(&mut state2, ContentType::ApplicationData, fragment).unwrap();
            assert_eq!(decoded, plaintext, "length {len}");
        }
    }

    #[test]
    fn gcm_round_trip() {
        let mut state = keyed_state(gcm_suite());
        let mut rng = FixedRandom::repeating(0x22);
        let plaintext = b"hello".to_vec();
        let mut wire = Vec::new();
        encode_record(&mut state, ContentType::ApplicationData, &plaintext, &mut rng, &mut wire);

        let fragment = &wire[5..];
        let mut state2 = keyed_state(gcm_suite());
        let decoded = decode_record(&mut state2, ContentType::ApplicationData, fragment).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn mutated_ciphertext_byte_is_bad_record_mac() {
        for suite in [cbc_suite(), gcm_suite()] {
            let mut state = keyed_state(suite);
            let mut rng = FixedRandom::repeating(0x33);
            let plaintext = b"attack at dawn".to_vec();
            let mut wire = Vec::new();
            encode_record(&mut state, ContentType::ApplicationData, &plaintext, &mut rng, &mut wire);

            let mut fragment = wire[5..].to_vec();
            let last = fragment.len() - 1;
            fragment[last] ^= 0xff;

            let mut state2 = keyed_state(suite);
            let err = decode_record(&mut state2, ContentType::ApplicationData, &fragment).unwrap_err();
            assert_eq!(err.description(), Some(AlertDescription::BadRecordMac));
        }
    }

    #[test]
    fn reused_sequence_number_fails() {
        let mut state = keyed_state(gcm_suite());
        let mut rng = FixedRandom::repeating(0x44);
        let mut wire_a = Vec::new();
        encode_record(&mut state, ContentType::ApplicationData, b"one", &mut rng, &mut wire_a);
        let mut wire_b = Vec::new();
        encode_record(&mut state, ContentType::ApplicationData, b"two", &mut rng, &mut wire_b);

        // Decrypt "two"'s ciphertext while the read state still expects seq 0
        // (i.e. replay/reuse of a sequence number the AEAD already consumed).
        let mut reader_state = keyed_state(gcm_suite());
        assert!(decode_record(&mut reader_state, ContentType::ApplicationData, &wire_b[5..]).is_err());
    }

    #[test]
    fn cbc_padding_length_255_is_accepted() {
        // Force a plaintext length that produces exactly 255 bytes of padding.
        let mut state = keyed_state(cbc_suite());
        let block_len = state.suite.block_len;
        let mac_len = state.suite.mac_len;
        // unpadded_len + pad_len ≡ 0 (mod block_len); choose plaintext so pad_len == 255.
        let mut plaintext_len = 0usize;
        loop {
            let unpadded = plaintext_len + mac_len + 1;
            let pad_len = (block_len - (unpadded % block_len)) % block_len;
            if pad_len == 255 {
                break;
            }
            plaintext_len += 1;
            if plaintext_len > 4096 {
                panic!("did not find a length producing 255 bytes of padding");
            }
        }
        let plaintext = vec![0xAB; plaintext_len];
        let mut rng = FixedRandom::repeating(0x55);
        let mut wire = Vec::new();
        encode_record(&mut state, ContentType::ApplicationData, &plaintext, &mut rng, &mut wire);

        let mut state2 = keyed_state(cbc_suite());
        let decoded = decode_record(&mut state2, ContentType::ApplicationData, &wire[5..]).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn ciphertext_length_boundary() {
        assert_eq!(MAX_CIPHERTEXT_FRAGMENT, (1 << 14) + 2048);
        let mut state = keyed_state(gcm_suite());
        let too_big = vec![0u8; MAX_CIPHERTEXT_FRAGMENT + 1];
        let err = decode_record(&mut state, ContentType::ApplicationData, &too_big).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::RecordOverflow));
    }
}
