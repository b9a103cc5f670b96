//! The top-level read/write loop an embedder drives directly: a plain
//! struct generic over `T: io::Read + io::Write`, constructed around a
//! caller-supplied transport and never touching a socket itself.

use std::collections::VecDeque;
use std::io::{Read, Write};

use log::{debug, error, warn};
use zeroize::Zeroize;

use crate::ciphersuite;
use crate::config::ClientConfig;
use crate::error::{AlertDescription, Result, TlsError};
use crate::handshake::fragment::{HandshakeBuffer, HelloRequestPolicy};
use crate::handshake::messages::{self, HandshakeType};
use crate::handshake::{HandshakeEngine, HandshakeOutcome};
use crate::primitives::rng::{OsRandom, SecureRandom};
use crate::record::buffer::RecordBuffer;
use crate::record::cipher_state::CipherStates;
use crate::record::{self, ContentType};

/// Cap on buffered plaintext accumulated while a handshake or
/// renegotiation is in progress (§3 "Buffered-application-read queue").
const MAX_QUEUED_APPLICATION_DATA: usize = 10 * 1024 * 1024;

pub struct Connection<T> {
    transport: T,
    cipher_states: CipherStates,
    record_buf: RecordBuffer,
    handshake_buf: HandshakeBuffer,
    engine: Option<HandshakeEngine>,
    config: ClientConfig,
    rng: Box<dyn SecureRandom>,
    established: bool,
    waiting_for_server_finished: bool,
    may_false_start: bool,
    /// Set while a renegotiation triggered by the *peer's* HelloRequest is
    /// in flight: writes block entirely until `ESTABLISHED`, working
    /// around a peer quirk (§4.6), regardless of false-start eligibility.
    writes_blocked_for_peer_quirk: bool,
    prior_verify_data: Option<(Vec<u8>, Vec<u8>)>,
    application_queue: VecDeque<Vec<u8>>,
    queued_bytes: usize,
    closed: bool,
}

impl<T: Read + Write> Connection<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Connection {
            transport,
            cipher_states: CipherStates::new(&ciphersuite::NULL_CIPHER),
            record_buf: RecordBuffer::new(),
            handshake_buf: HandshakeBuffer::new(),
            engine: None,
            config,
            rng: Box::new(OsRandom::new()),
            established: false,
            waiting_for_server_finished: false,
            may_false_start: false,
            writes_blocked_for_peer_quirk: false,
            prior_verify_data: None,
            application_queue: VecDeque::new(),
            queued_bytes: 0,
            closed: false,
        }
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    pub fn has_buffered_read_data(&self) -> bool {
        !self.application_queue.is_empty()
    }

    /// Drives the full client handshake to completion, blocking on the
    /// transport as needed.
    pub fn perform_initial_handshake(&mut self) -> Result<()> {
        if self.engine.is_some() || self.established {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }
        let mut engine = HandshakeEngine::new(false, None);
        let client_hello = engine.start(&self.config, self.rng.as_mut());
        debug!("sending ClientHello ({} bytes)", client_hello.len());
        self.write_record(ContentType::Handshake, &client_hello)?;
        self.engine = Some(engine);

        while !self.established {
            if let Err(e) = self.process_one_record() {
                self.fail(&e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Caller-initiated renegotiation (§4.5 "back to SERVER_FLIGHT ...
    /// initiated by ... the caller"). Unlike a peer HelloRequest, this does
    /// not invoke the write-blocking quirk workaround.
    pub fn renegotiate(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }
        self.start_renegotiation(false)?;
        while !self.established {
            if let Err(e) = self.process_one_record() {
                self.fail(&e);
                return Err(e);
            }
        }
        Ok(())
    }

    fn start_renegotiation(&mut self, triggered_by_peer: bool) -> Result<()> {
        self.writes_blocked_for_peer_quirk = triggered_by_peer;
        self.established = false;
        let mut engine = HandshakeEngine::new(true, self.prior_verify_data.clone());
        let client_hello = engine.start(&self.config, self.rng.as_mut());
        self.write_record(ContentType::Handshake, &client_hello)?;
        self.engine = Some(engine);
        self.waiting_for_server_finished = false;
        self.may_false_start = false;
        self.handshake_buf.reset_for_new_round();
        Ok(())
    }

    /// Reads decrypted application data into `buf`, pumping the transport
    /// (and transparently driving any in-progress renegotiation) until
    /// some is available. Returns `0` on an orderly peer close.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }
        while self.application_queue.is_empty() {
            match self.process_one_record() {
                Ok(()) => {}
                Err(TlsError::Protocol {
                    description: AlertDescription::CloseNotify,
                    from_peer: true,
                }) => {
                    self.shutdown_after_close_notify();
                    return Ok(0);
                }
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            }
        }

        let front = self
            .application_queue
            .front_mut()
            .expect("loop only exits once the queue is non-empty");
        let n = front.len().min(buf.len());
        buf[..n].copy_from_slice(&front[..n]);
        if n == front.len() {
            self.application_queue.pop_front();
        } else {
            front.drain(..n);
        }
        self.queued_bytes -= n;
        Ok(n)
    }

    /// Writes application data, splitting at `2^14` plaintext bytes per
    /// record (§4.6). Blocked while mid-handshake unless false start
    /// applies (§4.5 "False start").
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(TlsError::local(AlertDescription::InternalError));
        }
        if self.engine.is_some() {
            let false_start_ok =
                !self.writes_blocked_for_peer_quirk && self.waiting_for_server_finished && self.may_false_start;
            if !false_start_ok {
                return Err(TlsError::local(AlertDescription::UnexpectedMessage));
            }
        } else if !self.established {
            return Err(TlsError::local(AlertDescription::UnexpectedMessage));
        }

        self.write_record(ContentType::ApplicationData, buf)?;
        Ok(buf.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.transport.flush()?;
        Ok(())
    }

    /// Orderly shutdown initiated by the caller (§4.6, §8 scenario 6):
    /// sends `close_notify`, flushes, performs a zero-byte read to surface
    /// an abrupt reset, then marks the connection closed.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let _ = self.write_record(ContentType::Alert, &[1, AlertDescription::CloseNotify.code()]);
        let _ = self.transport.flush();
        let mut probe = [0u8; 1];
        let _ = self.transport.read(&mut probe);
        self.closed = true;
        self.zeroize_all_state();
        Ok(())
    }

    fn shutdown_after_close_notify(&mut self) {
        let _ = self.write_record(ContentType::Alert, &[1, AlertDescription::CloseNotify.code()]);
        let _ = self.transport.flush();
        let mut probe = [0u8; 1];
        let _ = self.transport.read(&mut probe);
        self.closed = true;
        self.zeroize_all_state();
    }

    /// HelloRequest policy (§4.5 "HelloRequest policy"): idle connections
    /// treat one as a renegotiation trigger; a handshake accumulating the
    /// server's flight ignores spurious HelloRequests until its own
    /// Finished round-trips; once the client has sent its own flight and is
    /// waiting on the peer's ChangeCipherSpec/Finished
    /// (`waiting_for_server_finished`), a HelloRequest must reach
    /// `dispatch_handshake_message`'s fatal check rather than be swallowed
    /// here — so that window is `Accept`, not `IgnoreUntilFinished`.
    fn hello_request_policy(&self) -> HelloRequestPolicy {
        if self.waiting_for_server_finished {
            HelloRequestPolicy::Accept
        } else if self.engine.is_some() {
            HelloRequestPolicy::IgnoreUntilFinished
        } else {
            HelloRequestPolicy::Accept
        }
    }

    fn process_one_record(&mut self) -> Result<()> {
        self.read_record()?;
        let content_type = self.record_buf.content_type;
        let plaintext = self.record_buf.plaintext().to_vec();

        match content_type {
            ContentType::ApplicationData => {
                if self.engine.is_none() && !self.established {
                    return Err(TlsError::local(AlertDescription::UnexpectedMessage));
                }
                self.queued_bytes += plaintext.len();
                if self.queued_bytes > MAX_QUEUED_APPLICATION_DATA {
                    return Err(TlsError::local(AlertDescription::UnexpectedMessage));
                }
                self.application_queue.push_back(plaintext);
            }
            ContentType::Handshake => {
                let policy = self.hello_request_policy();
                let messages = self.handshake_buf.push(&plaintext, policy)?;
                for msg in messages {
                    self.dispatch_handshake_message(msg)?;
                }
            }
            ContentType::ChangeCipherSpec => {
                if plaintext != [0x01] {
                    return Err(TlsError::local(AlertDescription::IllegalParameter));
                }
                if self.handshake_buf.has_partial_data() {
                    return Err(TlsError::local(AlertDescription::UnexpectedMessage));
                }
                if self.cipher_states.pending.is_none() && self.cipher_states.read_current.is_none() {
                    return Err(TlsError::local(AlertDescription::UnexpectedMessage));
                }
                self.cipher_states.activate_read(None);
                match self.engine.as_mut() {
                    Some(engine) => engine.expect_finished(),
                    None => return Err(TlsError::local(AlertDescription::UnexpectedMessage)),
                }
            }
            ContentType::Alert => {
                if plaintext.len() != 2 {
                    return Err(TlsError::local(AlertDescription::DecodeError));
                }
                let level = plaintext[0];
                let description = AlertDescription::from_code(plaintext[1])
                    .ok_or_else(|| TlsError::local(AlertDescription::DecodeError))?;
                if description == AlertDescription::CloseNotify {
                    return Err(TlsError::peer(AlertDescription::CloseNotify));
                }
                if level == 2 || description.is_fatal() {
                    return Err(TlsError::peer(description));
                }
                warn!("ignoring warning alert: {}", description);
            }
        }
        Ok(())
    }

    fn dispatch_handshake_message(&mut self, msg: crate::handshake::fragment::HandshakeMessage) -> Result<()> {
        if msg.ty == HandshakeType::HelloRequest {
            messages::parse_hello_request(&msg.body)?;
            if self.engine.is_some() {
                // A HelloRequest while a renegotiation is already underway
                // (WAIT_CCS/WAIT_FINISHED) is always fatal (§4.6, §8).
                return Err(TlsError::local(AlertDescription::UnexpectedMessage));
            }
            return self.start_renegotiation(true);
        }

        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| TlsError::local(AlertDescription::UnexpectedMessage))?;

        let outcome = if self.waiting_for_server_finished {
            engine.handle_server_finished(&msg)?
        } else {
            engine.handle_message(&msg, &self.config, self.rng.as_mut())?
        };
        self.apply_outcome(outcome)
    }

    fn apply_outcome(&mut self, outcome: HandshakeOutcome) -> Result<()> {
        match outcome {
            HandshakeOutcome::Continue => Ok(()),
            HandshakeOutcome::SendClientFlight {
                messages,
                pending_state,
                finished,
                may_false_start,
            } => {
                if !messages.is_empty() {
                    self.write_record(ContentType::Handshake, &messages)?;
                }
                self.cipher_states.pending = Some(pending_state);
                self.write_record(ContentType::ChangeCipherSpec, &[0x01])?;
                self.cipher_states.activate_write();
                self.write_record(ContentType::Handshake, &finished)?;
                self.may_false_start = may_false_start;
                self.waiting_for_server_finished = true;
                self.handshake_buf.reset_flight_count();
                Ok(())
            }
            HandshakeOutcome::Established {
                client_verify_data,
                server_verify_data,
            } => {
                self.prior_verify_data = Some((client_verify_data, server_verify_data));
                self.engine = None;
                self.established = true;
                self.waiting_for_server_finished = false;
                self.may_false_start = false;
                self.writes_blocked_for_peer_quirk = false;
                self.handshake_buf.reset_for_new_round();
                debug!("handshake established");
                Ok(())
            }
        }
    }

    fn read_record(&mut self) -> Result<()> {
        let mut header = [0u8; 5];
        self.transport.read_exact(&mut header)?;
        let content_type = ContentType::from_code(header[0])
            .ok_or_else(|| TlsError::local(AlertDescription::DecodeError))?;
        let len = u16::from_be_bytes([header[3], header[4]]) as usize;
        if len > record::MAX_CIPHERTEXT_FRAGMENT {
            return Err(TlsError::local(AlertDescription::RecordOverflow));
        }
        self.transport.read_exact(&mut self.record_buf.data[..len])?;

        let read_state = match self.cipher_states.read_current.as_mut() {
            Some(s) => s,
            None => &mut self.cipher_states.current,
        };
        let plaintext = record::decode_record(read_state, content_type, &self.record_buf.data[..len])?;

        let plaintext_len = plaintext.len();
        self.record_buf.data[..plaintext_len].copy_from_slice(&plaintext);
        self.record_buf.plaintext_start = 0;
        self.record_buf.plaintext_len = plaintext_len;
        self.record_buf.content_type = content_type;
        Ok(())
    }

    /// Encrypts `plaintext` under the current write state and writes it
    /// out, splitting at `MAX_PLAINTEXT` per record.
    fn write_record(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<()> {
        let chunks: Vec<&[u8]> = if plaintext.is_empty() {
            vec![plaintext]
        } else {
            plaintext.chunks(record::MAX_PLAINTEXT).collect()
        };
        for chunk in chunks {
            let mut wire = Vec::with_capacity(5 + chunk.len() + 64);
            record::encode_record(
                &mut self.cipher_states.current,
                content_type,
                chunk,
                self.rng.as_mut(),
                &mut wire,
            );
            self.transport.write_all(&wire)?;
        }
        Ok(())
    }

    fn fail(&mut self, err: &TlsError) {
        if let Some(description) = err.description() {
            if description.is_fatal() {
                error!("fatal alert: {}", description);
                let _ = self.write_record(ContentType::Alert, &[2, description.code()]);
            }
        }
        let _ = self.transport.flush();
        self.closed = true;
        self.zeroize_all_state();
    }

    fn zeroize_all_state(&mut self) {
        self.cipher_states = CipherStates::new(&ciphersuite::NULL_CIPHER);
        if let Some((client_vd, server_vd)) = self.prior_verify_data.as_mut() {
            client_vd.zeroize();
            server_vd.zeroize();
        }
        self.engine = None;
    }
}
