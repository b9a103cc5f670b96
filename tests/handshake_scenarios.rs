//! End-to-end scenarios that don't require a signed certificate fixture:
//! downgrade rejection, the ChangeCipherSpec payload boundary, and the
//! close_notify shutdown shape. Full RSA/ECDHE handshake fixtures (the
//! remaining scenarios) need a generated leaf certificate and are left to
//! the unit-level coverage in `handshake::kex` and `primitives::sign`,
//! which already exercise the underlying key-agreement and signature math
//! those scenarios depend on.

use std::cell::RefCell;
use std::io::{Cursor, Read, Write};
use std::rc::Rc;

use tls12_core::config::ClientConfig;
use tls12_core::handshake::fragment::HandshakeMessage;
use tls12_core::handshake::messages::{self, HandshakeType};
use tls12_core::handshake::HandshakeEngine;
use tls12_core::primitives::rng::OsRandom;
use tls12_core::{AlertDescription, Connection};

struct DuplexMock {
    read_buf: Cursor<Vec<u8>>,
    written: Rc<RefCell<Vec<u8>>>,
}

impl DuplexMock {
    fn with_server_bytes(bytes: Vec<u8>, written: Rc<RefCell<Vec<u8>>>) -> Self {
        DuplexMock {
            read_buf: Cursor::new(bytes),
            written,
        }
    }
}

impl Read for DuplexMock {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_buf.read(buf)
    }
}

impl Write for DuplexMock {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn plaintext_record(content_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![content_type, 3, 3];
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Scenario 4: "Server sends ServerHello with version {3,2}; client closes
/// with `protocol_version` alert."
#[test]
fn downgrade_attempt_is_rejected_with_protocol_version_alert() {
    let config = ClientConfig::new(None);
    let mut rng = OsRandom::new();
    let mut engine = HandshakeEngine::new(false, None);
    let _client_hello = engine.start(&config, &mut rng);

    let mut body = vec![3u8, 2]; // {3,2}: one minor version below the floor
    body.extend_from_slice(&[0u8; 32]); // server_random
    body.push(0); // session_id: empty
    body.extend_from_slice(&0xc02fu16.to_be_bytes()); // cipher_suite, irrelevant here
    body.push(0); // compression: null, no extensions block follows

    let raw = messages::wrap(HandshakeType::ServerHello, &body);
    let msg = HandshakeMessage {
        ty: HandshakeType::ServerHello,
        raw,
        body,
    };

    let err = engine.handle_message(&msg, &config, &mut rng).unwrap_err();
    assert_eq!(err.description(), Some(AlertDescription::ProtocolVersion));
}

/// Boundary test (§8): "ChangeCipherSpec with payload `0x00` →
/// `illegal_parameter`." The connection is still in its initial null-cipher
/// epoch, so the malformed record can be handed to the client directly
/// without a prior handshake.
#[test]
fn change_cipher_spec_with_wrong_payload_is_fatal() {
    let server_bytes = plaintext_record(20, &[0x00]);
    let written = Rc::new(RefCell::new(Vec::new()));
    let transport = DuplexMock::with_server_bytes(server_bytes, written);
    let mut conn = Connection::new(transport, ClientConfig::new(None));

    let err = conn.perform_initial_handshake().unwrap_err();
    assert_eq!(err.description(), Some(AlertDescription::IllegalParameter));
}

/// Scenario 6: "caller invokes close; the client emits one Alert record
/// (level warning, description 0), flushes, performs a zero-byte transport
/// read, then closes."
#[test]
fn close_emits_a_single_warning_level_close_notify_alert() {
    let written = Rc::new(RefCell::new(Vec::new()));
    let transport = DuplexMock::with_server_bytes(Vec::new(), written.clone());
    let mut conn = Connection::new(transport, ClientConfig::new(None));

    conn.close().unwrap();

    let bytes = written.borrow();
    assert_eq!(bytes.len(), 7, "one 5-byte header plus a 2-byte alert body");
    assert_eq!(bytes[0], 21, "content type Alert");
    assert_eq!(&bytes[1..3], &[3, 3], "version {{3,3}}");
    assert_eq!(&bytes[3..5], &[0, 2], "2-byte alert payload");
    assert_eq!(bytes[5], 1, "level: warning");
    assert_eq!(bytes[6], AlertDescription::CloseNotify.code());
    drop(bytes);

    // A second close() must not re-emit the alert.
    conn.close().unwrap();
    assert_eq!(written.borrow().len(), 7);
}
