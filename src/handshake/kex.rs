//! Key-exchange dispatch (§4.5, §9 "tagged variant {RSA, DHE, ECDHE, ECDH}").

use rsa::RsaPublicKey;

use crate::ciphersuite::KeyExchangeAlgorithm;
use crate::error::{AlertDescription, Result, TlsError};
use crate::primitives::bigint;
use crate::primitives::curve::{EcKeyPair, NamedCurve};
use crate::primitives::rng::{RngAdapter, SecureRandom};
use crate::primitives::sign;

/// Server-supplied key-exchange parameters parsed out of ServerKeyExchange;
/// absent entirely for RSA and the static ECDH_* suites, where the
/// certificate's own key is used directly.
pub enum ServerParams {
    Dhe { p: Vec<u8>, g: Vec<u8>, ys: Vec<u8> },
    Ecdhe { curve: NamedCurve, point: Vec<u8> },
}

/// What ClientKeyExchange carries on the wire, plus the PreMasterSecret
/// derived alongside it (never itself placed on the wire).
pub struct ClientKeyExchangeResult {
    pub message_body: Vec<u8>,
    pub pre_master_secret: Vec<u8>,
}

/// Computes ClientKeyExchange's body and the PreMasterSecret for the
/// negotiated key-exchange algorithm (§4.5 "ClientKeyExchange content").
pub fn client_key_exchange(
    algorithm: KeyExchangeAlgorithm,
    server_params: Option<&ServerParams>,
    rsa_leaf_key: Option<&RsaPublicKey>,
    static_ec_point: Option<(NamedCurve, &[u8])>,
    rng: &mut dyn SecureRandom,
) -> Result<ClientKeyExchangeResult> {
    match algorithm {
        KeyExchangeAlgorithm::Rsa => {
            let key =
                rsa_leaf_key.ok_or_else(|| TlsError::local(AlertDescription::InternalError))?;
            let mut pre_master = vec![0u8; 48];
            pre_master[0] = 3;
            pre_master[1] = 3;
            rng.fill(&mut pre_master[2..]);
            let encrypted = sign::rsa_pkcs1_encrypt(key, &pre_master, rng);

            let mut body = Vec::with_capacity(2 + encrypted.len());
            body.extend_from_slice(&(encrypted.len() as u16).to_be_bytes());
            body.extend_from_slice(&encrypted);
            Ok(ClientKeyExchangeResult {
                message_body: body,
                pre_master_secret: pre_master,
            })
        }
        KeyExchangeAlgorithm::Dhe => {
            let sp = server_params.ok_or_else(|| TlsError::local(AlertDescription::InternalError))?;
            let ServerParams::Dhe { p, g, ys } = sp else {
                return Err(TlsError::local(AlertDescription::InternalError));
            };

            let mut x_c = vec![0u8; p.len()];
            loop {
                rng.fill(&mut x_c);
                if x_c.iter().any(|&b| b != 0) {
                    break;
                }
            }
            let y_c = bigint::modpow(g, &x_c, p);
            // RFC 5246 §8.1.2: pre_master_secret is Z's minimal unsigned
            // big-endian representation, not padded out to p's length.
            let pre_master = bigint::modpow(ys, &x_c, p);

            let mut body = Vec::with_capacity(2 + y_c.len());
            body.extend_from_slice(&(y_c.len() as u16).to_be_bytes());
            body.extend_from_slice(&y_c);
            Ok(ClientKeyExchangeResult {
                message_body: body,
                pre_master_secret: pre_master,
            })
        }
        KeyExchangeAlgorithm::Ecdhe => {
            let sp = server_params.ok_or_else(|| TlsError::local(AlertDescription::InternalError))?;
            let ServerParams::Ecdhe { curve, point } = sp else {
                return Err(TlsError::local(AlertDescription::InternalError));
            };
            ecdh_exchange(*curve, point, rng)
        }
        KeyExchangeAlgorithm::EcdhRsa | KeyExchangeAlgorithm::EcdhEcdsa => {
            let (curve, point) = static_ec_point
                .ok_or_else(|| TlsError::local(AlertDescription::InternalError))?;
            ecdh_exchange(curve, point, rng)
        }
    }
}

fn ecdh_exchange(
    curve: NamedCurve,
    peer_point: &[u8],
    rng: &mut dyn SecureRandom,
) -> Result<ClientKeyExchangeResult> {
    let mut adapter = RngAdapter(rng);
    let keypair = EcKeyPair::generate(curve, &mut adapter);
    let our_point = keypair.public_point_uncompressed();
    let pre_master = keypair.shared_secret(peer_point)?;

    let mut body = Vec::with_capacity(1 + our_point.len());
    body.push(our_point.len() as u8);
    body.extend_from_slice(&our_point);
    Ok(ClientKeyExchangeResult {
        message_body: body,
        pre_master_secret: pre_master,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::rng::FixedRandom;

    #[test]
    fn rsa_premaster_has_version_prefix_and_round_trips() {
        let mut rng_gen = rand::rngs::OsRng;
        let private = rsa::RsaPrivateKey::new(&mut rng_gen, 1024).unwrap();
        let public = RsaPublicKey::from(&private);
        let mut fixed = FixedRandom::repeating(0x42);

        let result =
            client_key_exchange(KeyExchangeAlgorithm::Rsa, None, Some(&public), None, &mut fixed)
                .unwrap();
        assert_eq!(result.pre_master_secret.len(), 48);
        assert_eq!(result.pre_master_secret[0], 3);
        assert_eq!(result.pre_master_secret[1], 3);

        let encrypted = &result.message_body[2..];
        let decrypted = private.decrypt(rsa::Pkcs1v15Encrypt, encrypted).unwrap();
        assert_eq!(decrypted, result.pre_master_secret);
    }

    #[test]
    fn dhe_agreement_matches_server_side_modpow() {
        let p = vec![23u8];
        let g = vec![5u8];
        let server_x = vec![6u8];
        let ys = bigint::modpow(&g, &server_x, &p);
        let params = ServerParams::Dhe {
            p: p.clone(),
            g: g.clone(),
            ys,
        };
        let mut rng = FixedRandom::new(vec![4]);

        let result =
            client_key_exchange(KeyExchangeAlgorithm::Dhe, Some(&params), None, None, &mut rng)
                .unwrap();
        let y_c = &result.message_body[2..];
        let server_side_secret = bigint::modpow(y_c, &server_x, &p);
        assert_eq!(server_side_secret, result.pre_master_secret);
    }

    #[test]
    fn ecdhe_agreement_matches_between_client_and_server() {
        let mut server_rng = FixedRandom::new((0u8..=255).collect());
        let server_adapter = &mut crate::primitives::rng::RngAdapter(&mut server_rng);
        let server_keypair = EcKeyPair::generate(NamedCurve::Secp256r1, server_adapter);
        let server_point = server_keypair.public_point_uncompressed();
        let server_params = ServerParams::Ecdhe {
            curve: NamedCurve::Secp256r1,
            point: server_point.clone(),
        };

        let mut client_rng = FixedRandom::new((1u8..=255).collect());
        let result = client_key_exchange(
            KeyExchangeAlgorithm::Ecdhe,
            Some(&server_params),
            None,
            None,
            &mut client_rng,
        )
        .unwrap();

        let client_point = &result.message_body[1..];
        let server_side_secret = server_keypair.shared_secret(client_point).unwrap();
        assert_eq!(server_side_secret, result.pre_master_secret);
        assert_eq!(result.message_body[0] as usize, client_point.len());
    }
}
