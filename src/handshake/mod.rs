//! The handshake state machine (§4.5): drives ClientHello through
//! Finished, owns the running transcript, and hands the connection
//! controller a `ConnectionState` once a new epoch has been negotiated.
//! Record framing and defragmentation are the connection controller's job
//! (`fragment::HandshakeBuffer`); this module only ever sees complete
//! messages.

pub mod fragment;
pub mod kex;
pub mod messages;
pub mod transcript;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::ciphersuite::{CipherSuite, KeyExchangeAlgorithm};
use crate::config::ClientConfig;
use crate::error::{AlertDescription, Result, TlsError};
use crate::prf;
use crate::primitives::cert::{self, CertStatus};
use crate::primitives::hash;
use crate::primitives::rng::SecureRandom;
use crate::primitives::sign::{self, ClientSignatureKind, HashAlg, PublicKey};
use crate::record::cipher_state::ConnectionState;

use fragment::HandshakeMessage;
use kex::ServerParams;
use messages::{CertificateRequestInfo, ClientHelloParams, HandshakeType, SignatureAlgorithm};
use transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    Idle,
    ClientHelloSent,
    InFlight,
    WaitCcs,
    WaitFinished,
    Established,
    Closed,
}

/// What the connection controller should do after feeding a message in.
#[derive(Debug)]
pub enum HandshakeOutcome {
    /// Keep reading; the flight isn't complete yet.
    Continue,
    /// ServerHelloDone triggered the client's own flight. `pending_state`
    /// becomes `current` once the controller sends its own
    /// ChangeCipherSpec (§3 `CipherStates::activate_write`); `finished` is
    /// returned separately since it's encrypted under `pending_state`
    /// rather than the plaintext the rest of `messages` goes out under.
    SendClientFlight {
        messages: Vec<u8>,
        pending_state: ConnectionState,
        finished: Vec<u8>,
        may_false_start: bool,
    },
    /// The server's Finished verified; the handshake is complete.
    Established {
        client_verify_data: Vec<u8>,
        server_verify_data: Vec<u8>,
    },
}

#[derive(Default)]
struct ParsedServerFlight {
    cipher_suite: Option<&'static CipherSuite>,
    server_random: [u8; 32],
    certs: Vec<Vec<u8>>,
    server_params: Option<ServerParams>,
    server_public_key: Option<PublicKey>,
    cert_request: Option<CertificateRequestInfo>,
}

/// One handshake's worth of state, fresh for every initial handshake and
/// every renegotiation (§4.6 "renegotiation restarts the handshake engine
/// with the prior connection's verify_data carried forward").
pub struct HandshakeEngine {
    state: HandshakeState,
    transcript: Transcript,
    client_random: [u8; 32],
    is_renegotiation: bool,
    /// `(client_verify_data, server_verify_data)` from the connection's
    /// most recently completed handshake, required to validate the
    /// `renegotiation_info` extension on a renegotiation (RFC 5746).
    prior_verify_data: Option<(Vec<u8>, Vec<u8>)>,
    flight: ParsedServerFlight,
    got_server_hello: bool,
    got_certificate: bool,
    got_server_key_exchange: bool,
    got_cert_request: bool,
    master_secret: Vec<u8>,
    client_verify_data: Vec<u8>,
}

impl HandshakeEngine {
    pub fn new(is_renegotiation: bool, prior_verify_data: Option<(Vec<u8>, Vec<u8>)>) -> Self {
        HandshakeEngine {
            state: HandshakeState::Idle,
            transcript: Transcript::new(),
            client_random: [0u8; 32],
            is_renegotiation,
            prior_verify_data,
            flight: ParsedServerFlight::default(),
            got_server_hello: false,
            got_certificate: false,
            got_server_key_exchange: false,
            got_cert_request: false,
            master_secret: Vec::new(),
            client_verify_data: Vec::new(),
        }
    }

    /// Builds and returns the wire-ready ClientHello, hashing it into the
    /// transcript and advancing to `ClientHelloSent`.
    pub fn start(&mut self, config: &ClientConfig, rng: &mut dyn SecureRandom) -> Vec<u8> {
        let mut client_random = [0u8; 32];
        rng.fill(&mut client_random);
        let unix_secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        client_random[..4].copy_from_slice(&unix_secs.to_be_bytes());

        let renegotiation_info: Vec<u8> = match &self.prior_verify_data {
            Some((client_vd, _)) => client_vd.clone(),
            None => Vec::new(),
        };

        let params = ClientHelloParams {
            client_random,
            cipher_suites: &config.offered_suites,
            server_name: config.sni_hostname(),
            renegotiation_info: &renegotiation_info,
            offer_ec: true,
        };
        let body = messages::encode_client_hello(&params);
        let raw = messages::wrap(HandshakeType::ClientHello, &body);

        self.transcript.update(&raw);
        self.client_random = client_random;
        self.state = HandshakeState::ClientHelloSent;
        raw
    }

    /// Feeds one reassembled handshake message in. Everything but
    /// HelloRequest (handled by the connection controller before this
    /// engine ever sees it, since it can arrive mid-`ApplicationData`) is
    /// hashed into the transcript before dispatch.
    pub fn handle_message(
        &mut self,
        msg: &HandshakeMessage,
        config: &ClientConfig,
        rng: &mut dyn SecureRandom,
    ) -> Result<HandshakeOutcome> {
        self.transcript.update(&msg.raw);

        match msg.ty {
            HandshakeType::ServerHello => {
                self.on_server_hello(&msg.body, config)?;
                Ok(HandshakeOutcome::Continue)
            }
            HandshakeType::Certificate => {
                self.on_certificate(&msg.body, config)?;
                Ok(HandshakeOutcome::Continue)
            }
            HandshakeType::ServerKeyExchange => {
                self.on_server_key_exchange(&msg.body)?;
                Ok(HandshakeOutcome::Continue)
            }
            HandshakeType::CertificateRequest => {
                self.on_certificate_request(&msg.body)?;
                Ok(HandshakeOutcome::Continue)
            }
            HandshakeType::ServerHelloDone => {
                messages::parse_server_hello_done(&msg.body)?;
                self.build_client_flight(config, rng)
            }
            _ => Err(TlsError::local(AlertDescription::UnexpectedMessage)),
        }
    }

    fn on_server_hello(&mut self, body: &[u8], config: &ClientConfig) -> Result<()> {
        if self.state != HandshakeState::ClientHelloSent {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }
        let sh = messages::parse_server_hello(body)?;
        let suite = CipherSuite::by_id(sh.cipher_suite)
            .ok_or_else(|| TlsError::local(AlertDescription::HandshakeFailure))?;
        self.transcript.fix_prf_hash(suite.prf_hash);

        match (&sh.renegotiation_info, self.is_renegotiation, &self.prior_verify_data) {
            (None, false, _) => {
                if config.strict_renegotiation {
                    return Err(TlsError::local(AlertDescription::HandshakeFailure));
                }
            }
            (None, true, _) => return Err(TlsError::local(AlertDescription::HandshakeFailure)),
            (Some(info), false, _) => {
                if !info.is_empty() {
                    return Err(TlsError::local(AlertDescription::HandshakeFailure));
                }
            }
            (Some(info), true, Some((client_vd, server_vd))) => {
                let mut expected = Vec::with_capacity(client_vd.len() + server_vd.len());
                expected.extend_from_slice(client_vd);
                expected.extend_from_slice(server_vd);
                if info.as_slice() != expected.as_slice() {
                    return Err(TlsError::local(AlertDescription::HandshakeFailure));
                }
            }
            (Some(_), true, None) => return Err(TlsError::local(AlertDescription::InternalError)),
        }

        self.flight.cipher_suite = Some(suite);
        self.flight.server_random = sh.server_random;
        self.got_server_hello = true;
        self.state = HandshakeState::InFlight;
        Ok(())
    }

    fn on_certificate(&mut self, body: &[u8], config: &ClientConfig) -> Result<()> {
        if !self.got_server_hello || self.got_certificate {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }
        let certs = messages::parse_certificate_list(body)?;
        if certs.is_empty() {
            return Err(TlsError::local(AlertDescription::HandshakeFailure));
        }

        let built = cert::build_chain(&certs)
            .map_err(|_| TlsError::local(AlertDescription::CertificateUnknown))?;

        let mut fatal = None;
        for status in &built.statuses {
            match status {
                CertStatus::Ok => {}
                CertStatus::NotTimeValid => {
                    fatal.get_or_insert(AlertDescription::CertificateExpired);
                }
                CertStatus::Revoked => {
                    fatal.get_or_insert(AlertDescription::CertificateRevoked);
                }
                CertStatus::RevocationStatusUnknown => {
                    if config.treat_unknown_revocation_as_fatal {
                        fatal.get_or_insert(AlertDescription::CertificateUnknown);
                    }
                }
                CertStatus::Other => {
                    fatal.get_or_insert(AlertDescription::CertificateUnknown);
                }
            }
        }

        let hostname_mismatch = config
            .hostname
            .as_deref()
            .filter(|_| !config.is_ip_literal())
            .map(|hostname| !cert::hostname_matches(&certs[0], hostname))
            .unwrap_or(false);

        if fatal.is_some() || hostname_mismatch {
            let allowed = config
                .verify_callback
                .as_ref()
                .map(|cb| cb(&certs, &built.statuses))
                .unwrap_or(false);
            if !allowed {
                return Err(TlsError::local(
                    fatal.unwrap_or(AlertDescription::CertificateUnknown),
                ));
            }
        }

        self.flight.server_public_key = Some(built.leaf_public_key);
        self.flight.certs = certs;
        self.got_certificate = true;
        Ok(())
    }

    fn on_server_key_exchange(&mut self, body: &[u8]) -> Result<()> {
        let suite = self
            .flight
            .cipher_suite
            .ok_or_else(|| TlsError::local(AlertDescription::UnexpectedMessage))?;
        if !self.got_certificate
            || self.got_server_key_exchange
            || !suite.key_exchange.expects_server_key_exchange()
        {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }
        let ske = messages::parse_server_key_exchange(suite.key_exchange, body)?;

        let mut signed = Vec::with_capacity(64 + ske.params_raw.len());
        signed.extend_from_slice(&self.client_random);
        signed.extend_from_slice(&self.flight.server_random);
        signed.extend_from_slice(&ske.params_raw);
        let digest = hash::digest(ske.hash_alg, &signed);

        let public_key = self
            .flight
            .server_public_key
            .as_ref()
            .ok_or_else(|| TlsError::local(AlertDescription::InternalError))?;
        check_sig_alg_matches_key(ske.sig_alg, public_key)?;

        if !sign::verify(public_key, ske.hash_alg, &digest, &ske.signature) {
            return Err(TlsError::local(AlertDescription::DecryptError));
        }

        self.flight.server_params = Some(ske.params);
        self.got_server_key_exchange = true;
        Ok(())
    }

    fn on_certificate_request(&mut self, body: &[u8]) -> Result<()> {
        if !self.got_certificate || self.got_cert_request {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }
        self.flight.cert_request = Some(messages::parse_certificate_request(body)?);
        self.got_cert_request = true;
        Ok(())
    }

    /// ServerHelloDone triggers this: optional client Certificate, always
    /// ClientKeyExchange, optional CertificateVerify, then MasterSecret and
    /// key-block derivation, then the client's Finished (§4.5 "Client
    /// flight").
    fn build_client_flight(
        &mut self,
        config: &ClientConfig,
        rng: &mut dyn SecureRandom,
    ) -> Result<HandshakeOutcome> {
        if self.state != HandshakeState::InFlight {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }
        let suite = self.flight.cipher_suite.expect("InFlight implies a negotiated suite");
        if suite.key_exchange.expects_server_key_exchange() && !self.got_server_key_exchange {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }

        let mut out = Vec::new();

        if self.got_cert_request {
            let chain_body = messages::encode_certificate_list(&config.client_certificate_chain);
            let raw = messages::wrap(HandshakeType::Certificate, &chain_body);
            self.transcript.update(&raw);
            out.extend_from_slice(&raw);
        }

        let rsa_leaf_key = match (&self.flight.server_public_key, suite.key_exchange) {
            (Some(PublicKey::Rsa(key)), KeyExchangeAlgorithm::Rsa) => Some(key),
            _ => None,
        };
        let kex_result = kex::client_key_exchange(
            suite.key_exchange,
            self.flight.server_params.as_ref(),
            rsa_leaf_key,
            None,
            rng,
        )?;
        let cke_raw = messages::wrap(HandshakeType::ClientKeyExchange, &kex_result.message_body);
        self.transcript.update(&cke_raw);
        out.extend_from_slice(&cke_raw);

        if self.got_cert_request && !config.client_certificate_chain.is_empty() {
            let key = config
                .client_private_key
                .as_ref()
                .ok_or_else(|| TlsError::local(AlertDescription::InternalError))?;
            let sha1_digest = self.transcript.sha1_digest();
            let (kind, signature) = sign::sign_certificate_verify(key, &sha1_digest, rng);
            let sig_alg = match kind {
                ClientSignatureKind::Rsa => SignatureAlgorithm::Rsa,
                ClientSignatureKind::Dsa => SignatureAlgorithm::Dsa,
            };
            let body = messages::encode_certificate_verify(HashAlg::Sha1, sig_alg, &signature);
            let raw = messages::wrap(HandshakeType::CertificateVerify, &body);
            self.transcript.update(&raw);
            out.extend_from_slice(&raw);
        }

        let mut seed = Vec::with_capacity(64);
        seed.extend_from_slice(&self.client_random);
        seed.extend_from_slice(&self.flight.server_random);
        let master_secret = prf::prf(
            suite.prf_hash,
            &kex_result.pre_master_secret,
            prf::MASTER_SECRET_LABEL,
            &seed,
            48,
        );
        let mut pre_master_secret = kex_result.pre_master_secret;
        pre_master_secret.zeroize();

        let mut kb_seed = Vec::with_capacity(64);
        kb_seed.extend_from_slice(&self.flight.server_random);
        kb_seed.extend_from_slice(&self.client_random);
        let key_block_len = 2 * suite.mac_len + 2 * suite.key_len + 2 * suite.fixed_iv_len;
        let mut key_block = prf::prf(
            suite.prf_hash,
            &master_secret,
            prf::KEY_EXPANSION_LABEL,
            &kb_seed,
            key_block_len,
        );
        let pending_state = ConnectionState::from_key_block(suite, &key_block);
        key_block.zeroize();

        let hash1 = self.transcript.hash1_digest();
        let client_verify_data = prf::prf(
            suite.prf_hash,
            &master_secret,
            prf::CLIENT_FINISHED_LABEL,
            &hash1,
            12,
        );
        let finished_body = messages::encode_finished(&client_verify_data);
        let finished_raw = messages::wrap(HandshakeType::Finished, &finished_body);
        self.transcript.update_hash2_only(&finished_raw);
        // `finished_raw` is returned separately, not appended to `out`: it
        // must go out under the pending cipher state, after
        // ChangeCipherSpec, while everything in `out` is still sent under
        // the old one (§4.5 "Client flight").

        self.master_secret = master_secret;
        self.client_verify_data = client_verify_data;
        self.state = HandshakeState::WaitCcs;

        Ok(HandshakeOutcome::SendClientFlight {
            messages: out,
            pending_state,
            finished: finished_raw,
            may_false_start: suite.key_exchange.is_forward_secret(),
        })
    }

    /// Called by the connection controller once the peer's
    /// ChangeCipherSpec record has been processed: the next Handshake
    /// message to arrive must be the server's Finished.
    pub fn expect_finished(&mut self) {
        self.state = HandshakeState::WaitFinished;
    }

    /// Verifies the server's Finished against `hash2` (which does not
    /// include this message itself) and completes the handshake.
    pub fn handle_server_finished(&mut self, msg: &HandshakeMessage) -> Result<HandshakeOutcome> {
        if self.state != HandshakeState::WaitFinished || msg.ty != HandshakeType::Finished {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }
        let suite = self
            .flight
            .cipher_suite
            .ok_or_else(|| TlsError::local(AlertDescription::InternalError))?;
        let hash2 = self.transcript.hash2_digest();
        let expected = prf::prf(
            suite.prf_hash,
            &self.master_secret,
            prf::SERVER_FINISHED_LABEL,
            &hash2,
            12,
        );
        let received = messages::parse_finished(&msg.body)?;
        let ok: bool = expected.ct_eq(received).into();
        if !ok {
            return Err(TlsError::local(AlertDescription::DecryptError));
        }

        let client_verify_data = self.client_verify_data.clone();
        let server_verify_data = received.to_vec();
        self.master_secret.zeroize();
        self.state = HandshakeState::Established;

        Ok(HandshakeOutcome::Established {
            client_verify_data,
            server_verify_data,
        })
    }

    pub fn close(&mut self) {
        self.state = HandshakeState::Closed;
    }
}

impl Drop for HandshakeEngine {
    fn drop(&mut self) {
        self.master_secret.zeroize();
        self.client_verify_data.zeroize();
    }
}

fn check_sig_alg_matches_key(sig_alg: SignatureAlgorithm, key: &PublicKey) -> Result<()> {
    let ok = matches!(
        (sig_alg, key),
        (SignatureAlgorithm::Rsa, PublicKey::Rsa(_))
            | (SignatureAlgorithm::Dsa, PublicKey::Dsa(_))
            | (SignatureAlgorithm::Ecdsa, PublicKey::EcdsaP256(_))
            | (SignatureAlgorithm::Ecdsa, PublicKey::EcdsaP384(_))
    );
    if ok {
        Ok(())
    } else {
        Err(TlsError::local(AlertDescription::IllegalParameter))
    }
}
