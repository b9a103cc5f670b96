//! Handshake message wire format (§4.5): ClientHello through Finished,
//! encoded/decoded independently of defragmentation (`fragment.rs`) and the
//! state machine (`mod.rs`).

use crate::ciphersuite::KeyExchangeAlgorithm;
use crate::error::{AlertDescription, Result, TlsError};
use crate::handshake::kex::ServerParams;
use crate::primitives::curve::NamedCurve;
use crate::primitives::sign::HashAlg;
use crate::wire::{Reader, Writer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeType {
    HelloRequest,
    ClientHello,
    ServerHello,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
}

impl HandshakeType {
    pub fn code(self) -> u8 {
        use HandshakeType::*;
        match self {
            HelloRequest => 0,
            ClientHello => 1,
            ServerHello => 2,
            Certificate => 11,
            ServerKeyExchange => 12,
            CertificateRequest => 13,
            ServerHelloDone => 14,
            CertificateVerify => 15,
            ClientKeyExchange => 16,
            Finished => 20,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use HandshakeType::*;
        Some(match code {
            0 => HelloRequest,
            1 => ClientHello,
            2 => ServerHello,
            11 => Certificate,
            12 => ServerKeyExchange,
            13 => CertificateRequest,
            14 => ServerHelloDone,
            15 => CertificateVerify,
            16 => ClientKeyExchange,
            20 => Finished,
            _ => return None,
        })
    }
}

/// Wraps a message body with its 4-byte `type(1) ‖ length(3)` header.
pub fn wrap(ty: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.push(ty.code());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

/// The wire `signature_algorithm` byte (RFC 5246 §7.4.1.4.1); `anonymous`
/// is never produced or accepted by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Rsa,
    Dsa,
    Ecdsa,
}

impl SignatureAlgorithm {
    fn wire(self) -> u8 {
        match self {
            SignatureAlgorithm::Rsa => 1,
            SignatureAlgorithm::Dsa => 2,
            SignatureAlgorithm::Ecdsa => 3,
        }
    }

    fn from_wire(v: u8) -> Option<Self> {
        Some(match v {
            1 => SignatureAlgorithm::Rsa,
            2 => SignatureAlgorithm::Dsa,
            3 => SignatureAlgorithm::Ecdsa,
            _ => return None,
        })
    }
}

fn hash_alg_wire(h: HashAlg) -> u8 {
    match h {
        HashAlg::Sha1 => 2,
        HashAlg::Sha256 => 4,
        HashAlg::Sha384 => 5,
        HashAlg::Sha512 => 6,
    }
}

pub fn hash_alg_from_wire(v: u8) -> Option<HashAlg> {
    Some(match v {
        2 => HashAlg::Sha1,
        4 => HashAlg::Sha256,
        5 => HashAlg::Sha384,
        6 => HashAlg::Sha512,
        _ => return None,
    })
}

fn encode_extension(out: &mut Writer, ext_type: u16, body: impl FnOnce(&mut Writer)) {
    out.u16(ext_type);
    let mut inner = Writer::new();
    body(&mut inner);
    out.vec16(&inner.buf);
}

// -------- ClientHello --------

pub struct ClientHelloParams<'a> {
    pub client_random: [u8; 32],
    pub cipher_suites: &'a [u16],
    pub server_name: Option<&'a str>,
    pub renegotiation_info: &'a [u8],
    pub offer_ec: bool,
}

/// Encodes the ClientHello body (§4.5). `client_random`'s first 4 bytes
/// are assumed to already carry a Unix timestamp — the caller (the
/// handshake engine) is responsible for that, since it owns the RNG/clock
/// boundary.
pub fn encode_client_hello(p: &ClientHelloParams) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(3);
    w.u8(3);
    w.bytes(&p.client_random);
    w.u8(0); // session_id: empty, no resumption support

    let mut suites = Writer::new();
    for &id in p.cipher_suites {
        suites.u16(id);
    }
    w.vec16(&suites.buf);

    w.vec8(&[0]); // compression methods: {null}

    let mut ext = Writer::new();
    encode_extension(&mut ext, 0xff01, |w| w.bytes(p.renegotiation_info));

    if let Some(name) = p.server_name {
        encode_extension(&mut ext, 0x0000, |w| {
            let mut list = Writer::new();
            list.u8(0); // host_name
            list.vec16(name.as_bytes());
            w.vec16(&list.buf);
        });
    }

    encode_extension(&mut ext, 0x000d, |w| {
        let mut pairs = Writer::new();
        for hash in [2u8, 4, 5, 6] {
            pairs.u8(hash);
            pairs.u8(SignatureAlgorithm::Ecdsa.wire());
            pairs.u8(hash);
            pairs.u8(SignatureAlgorithm::Rsa.wire());
        }
        pairs.u8(2);
        pairs.u8(SignatureAlgorithm::Dsa.wire());
        w.vec16(&pairs.buf);
    });

    if p.offer_ec {
        encode_extension(&mut ext, 0x000a, |w| {
            let mut curves = Writer::new();
            for curve in [
                NamedCurve::Secp256r1,
                NamedCurve::Secp384r1,
                NamedCurve::Secp521r1,
            ] {
                curves.u16(curve.wire_id());
            }
            w.vec16(&curves.buf);
        });
        encode_extension(&mut ext, 0x000b, |w| {
            w.vec8(&[0]); // uncompressed
        });
    }

    w.vec16(&ext.buf);
    w.into_bytes()
}

// -------- ServerHello --------

pub struct ServerHello {
    pub server_random: [u8; 32],
    pub cipher_suite: u16,
    pub renegotiation_info: Option<Vec<u8>>,
}

/// Parses ServerHello, rejecting any extension this client does not
/// recognise as fatal (§4.5 "Unknown extensions are fatal"), mapped onto
/// the closed alert set as `handshake_failure` since no dedicated
/// `unsupported_extension` member exists here.
pub fn parse_server_hello(body: &[u8]) -> Result<ServerHello> {
    let mut r = Reader::new(body);
    let major = r.u8()?;
    let minor = r.u8()?;
    if (major, minor) != (3, 3) {
        return Err(TlsError::local(AlertDescription::ProtocolVersion));
    }
    let mut server_random = [0u8; 32];
    server_random.copy_from_slice(r.bytes(32)?);
    let _session_id = r.vec8()?;
    let cipher_suite = r.u16()?;
    let compression = r.u8()?;
    if compression != 0 {
        return Err(TlsError::local(AlertDescription::IllegalParameter));
    }

    let mut renegotiation_info = None;
    if r.remaining() > 0 {
        let ext_block = r.vec16()?;
        let mut er = Reader::new(ext_block);
        while er.remaining() > 0 {
            let ext_type = er.u16()?;
            let ext_body = er.vec16()?;
            match ext_type {
                0xff01 => {
                    let mut ir = Reader::new(ext_body);
                    renegotiation_info = Some(ir.vec8()?.to_vec());
                }
                0x0000 => {} // server_name ack: empty, nothing to record
                _ => return Err(TlsError::local(AlertDescription::HandshakeFailure)),
            }
        }
    }
    r.expect_empty()?;

    Ok(ServerHello {
        server_random,
        cipher_suite,
        renegotiation_info,
    })
}

// -------- Certificate --------

pub fn parse_certificate_list(body: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut r = Reader::new(body);
    let list = r.vec24()?;
    r.expect_empty()?;
    let mut lr = Reader::new(list);
    let mut certs = Vec::new();
    while lr.remaining() > 0 {
        certs.push(lr.vec24()?.to_vec());
    }
    Ok(certs)
}

pub fn encode_certificate_list(chain: &[Vec<u8>]) -> Vec<u8> {
    let mut inner = Writer::new();
    for cert in chain {
        inner.vec24(cert);
    }
    let mut w = Writer::new();
    w.vec24(&inner.buf);
    w.into_bytes()
}

// -------- ServerKeyExchange --------

pub struct ServerKeyExchangeMessage {
    pub params: ServerParams,
    pub params_raw: Vec<u8>,
    pub hash_alg: HashAlg,
    pub sig_alg: SignatureAlgorithm,
    pub signature: Vec<u8>,
}

/// Parses ServerKeyExchange for DHE/ECDHE (the only key-exchange families
/// that send one, §4.5). `params_raw` is the exact byte range the trailing
/// signature covers, needed verbatim by the caller.
pub fn parse_server_key_exchange(
    algorithm: KeyExchangeAlgorithm,
    body: &[u8],
) -> Result<ServerKeyExchangeMessage> {
    let mut r = Reader::new(body);
    let params = match algorithm {
        KeyExchangeAlgorithm::Dhe => {
            let p = r.vec16()?.to_vec();
            let g = r.vec16()?.to_vec();
            let ys = r.vec16()?.to_vec();
            ServerParams::Dhe { p, g, ys }
        }
        KeyExchangeAlgorithm::Ecdhe => {
            let curve_type = r.u8()?;
            if curve_type != 0x03 {
                return Err(TlsError::local(AlertDescription::IllegalParameter));
            }
            let curve_id = r.u16()?;
            let curve = NamedCurve::from_wire(curve_id)
                .ok_or_else(|| TlsError::local(AlertDescription::IllegalParameter))?;
            let point = r.vec8()?.to_vec();
            ServerParams::Ecdhe { curve, point }
        }
        _ => return Err(TlsError::local(AlertDescription::UnexpectedMessage)),
    };
    let consumed = body.len() - r.remaining();
    let params_raw = body[..consumed].to_vec();

    let hash_wire = r.u8()?;
    let sig_wire = r.u8()?;
    let hash_alg = hash_alg_from_wire(hash_wire)
        .ok_or_else(|| TlsError::local(AlertDescription::IllegalParameter))?;
    let sig_alg = SignatureAlgorithm::from_wire(sig_wire)
        .ok_or_else(|| TlsError::local(AlertDescription::IllegalParameter))?;
    let signature = r.vec16()?.to_vec();
    r.expect_empty()?;

    Ok(ServerKeyExchangeMessage {
        params,
        params_raw,
        hash_alg,
        sig_alg,
        signature,
    })
}

// -------- CertificateRequest --------

pub struct CertificateRequestInfo {
    pub certificate_types: Vec<u8>,
    pub supported_signature_algorithms: Vec<(HashAlg, SignatureAlgorithm)>,
    pub certificate_authorities: Vec<Vec<u8>>,
}

pub fn parse_certificate_request(body: &[u8]) -> Result<CertificateRequestInfo> {
    let mut r = Reader::new(body);
    let certificate_types = r.vec8()?.to_vec();

    let sig_algs_raw = r.vec16()?;
    let mut sr = Reader::new(sig_algs_raw);
    let mut supported_signature_algorithms = Vec::new();
    while sr.remaining() > 0 {
        let hash = sr.u8()?;
        let sig = sr.u8()?;
        if let (Some(h), Some(s)) = (hash_alg_from_wire(hash), SignatureAlgorithm::from_wire(sig)) {
            supported_signature_algorithms.push((h, s));
        }
    }

    let ca_raw = r.vec16()?;
    let mut cr = Reader::new(ca_raw);
    let mut certificate_authorities = Vec::new();
    while cr.remaining() > 0 {
        certificate_authorities.push(cr.vec16()?.to_vec());
    }
    r.expect_empty()?;

    Ok(CertificateRequestInfo {
        certificate_types,
        supported_signature_algorithms,
        certificate_authorities,
    })
}

// -------- ServerHelloDone --------

pub fn parse_server_hello_done(body: &[u8]) -> Result<()> {
    if !body.is_empty() {
        return Err(TlsError::local(AlertDescription::DecodeError));
    }
    Ok(())
}

// -------- CertificateVerify --------

pub fn encode_certificate_verify(hash_alg: HashAlg, sig_alg: SignatureAlgorithm, signature: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(hash_alg_wire(hash_alg));
    w.u8(sig_alg.wire());
    w.vec16(signature);
    w.into_bytes()
}

// -------- Finished --------

pub fn encode_finished(verify_data: &[u8]) -> Vec<u8> {
    verify_data.to_vec()
}

pub fn parse_finished(body: &[u8]) -> Result<&[u8]> {
    if body.len() != 12 {
        return Err(TlsError::local(AlertDescription::DecodeError));
    }
    Ok(body)
}

// -------- HelloRequest --------

pub fn parse_hello_request(body: &[u8]) -> Result<()> {
    if !body.is_empty() {
        return Err(TlsError::local(AlertDescription::DecodeError));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_hello_round_trip_shape() {
        let params = ClientHelloParams {
            client_random: [7u8; 32],
            cipher_suites: &[0xc02f, 0x002f],
            server_name: Some("example.com"),
            renegotiation_info: &[],
            offer_ec: true,
        };
        let body = encode_client_hello(&params);
        let mut r = Reader::new(&body);
        assert_eq!(r.u8().unwrap(), 3);
        assert_eq!(r.u8().unwrap(), 3);
        assert_eq!(r.bytes(32).unwrap(), &[7u8; 32][..]);
        assert_eq!(r.u8().unwrap(), 0); // session id length
        let suites = r.vec16().unwrap();
        assert_eq!(suites.len(), 4);
        let compression = r.vec8().unwrap();
        assert_eq!(compression, &[0]);
        assert!(r.remaining() > 0);
    }

    #[test]
    fn server_hello_parses_renegotiation_info() {
        let mut w = Writer::new();
        w.u8(3);
        w.u8(3);
        w.bytes(&[9u8; 32]);
        w.u8(0);
        w.u16(0xc02f);
        w.u8(0);
        let mut ext = Writer::new();
        encode_extension(&mut ext, 0xff01, |w| w.bytes(&[]));
        w.vec16(&ext.buf);

        let sh = parse_server_hello(&w.into_bytes()).unwrap();
        assert_eq!(sh.cipher_suite, 0xc02f);
        assert_eq!(sh.renegotiation_info, Some(vec![]));
    }

    #[test]
    fn server_hello_rejects_unknown_extension() {
        let mut w = Writer::new();
        w.u8(3);
        w.u8(3);
        w.bytes(&[9u8; 32]);
        w.u8(0);
        w.u16(0xc02f);
        w.u8(0);
        let mut ext = Writer::new();
        encode_extension(&mut ext, 0x1234, |w| w.bytes(&[1, 2, 3]));
        w.vec16(&ext.buf);

        assert!(parse_server_hello(&w.into_bytes()).is_err());
    }

    #[test]
    fn certificate_list_round_trips() {
        let chain = vec![vec![1u8, 2, 3], vec![4u8, 5]];
        let body = encode_certificate_list(&chain);
        let parsed = parse_certificate_list(&body).unwrap();
        assert_eq!(parsed, chain);
    }

    #[test]
    fn server_key_exchange_ecdhe_params_raw_matches_signed_range() {
        let mut w = Writer::new();
        w.u8(0x03);
        w.u16(23); // secp256r1
        let point = vec![0x04u8; 65];
        w.vec8(&point);
        let params_len = w.buf.len();
        w.u8(4); // sha256
        w.u8(1); // rsa
        w.vec16(&[0xAA, 0xBB]);

        let msg = parse_server_key_exchange(KeyExchangeAlgorithm::Ecdhe, &w.buf).unwrap();
        assert_eq!(msg.params_raw.len(), params_len);
        assert_eq!(msg.hash_alg, HashAlg::Sha256);
        assert_eq!(msg.sig_alg, SignatureAlgorithm::Rsa);
        assert_eq!(msg.signature, vec![0xAA, 0xBB]);
        match msg.params {
            ServerParams::Ecdhe { curve, point: p } => {
                assert_eq!(curve, NamedCurve::Secp256r1);
                assert_eq!(p, point);
            }
            _ => panic!("expected Ecdhe params"),
        }
    }
}
