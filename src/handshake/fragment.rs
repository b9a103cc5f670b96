//! Handshake message defragmentation (§4.4). Accepts raw bytes carried by
//! successive Handshake-content-type records and emits complete messages
//! (4-byte header + body) as soon as they're fully buffered; a message may
//! span records but never a ChangeCipherSpec boundary — the connection
//! controller only feeds this buffer bytes from one side of that fence at
//! a time.

use crate::error::{AlertDescription, Result, TlsError};
use crate::handshake::messages::HandshakeType;

/// How the buffer treats HelloRequest fragments (type 0); the caller
/// chooses per its own state (§4.6 "HelloRequest policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloRequestPolicy {
    /// Pass HelloRequest through like any other message.
    Accept,
    /// Drop every HelloRequest unconditionally.
    IgnoreAlways,
    /// Drop HelloRequest until a Finished message has passed through this
    /// buffer, then treat it like `Accept`.
    IgnoreUntilFinished,
}

/// One reassembled handshake message.
#[derive(Debug)]
pub struct HandshakeMessage {
    pub ty: HandshakeType,
    /// Header + body, exactly as transcript hashing needs it.
    pub raw: Vec<u8>,
    pub body: Vec<u8>,
}

const MAX_MESSAGES_PER_FLIGHT: usize = 5;

pub struct HandshakeBuffer {
    data: Vec<u8>,
    messages_in_flight: usize,
    saw_finished: bool,
}

impl HandshakeBuffer {
    pub fn new() -> Self {
        HandshakeBuffer {
            data: Vec::new(),
            messages_in_flight: 0,
            saw_finished: false,
        }
    }

    /// Resets the per-flight message counter at a flight boundary
    /// (ServerHelloDone processed, or after a ChangeCipherSpec/Finished
    /// exchange starts a new one).
    pub fn reset_flight_count(&mut self) {
        self.messages_in_flight = 0;
    }

    /// Resets both the flight counter and the `saw_finished` latch at the
    /// start of a new handshake round (initial handshake or a fresh
    /// renegotiation) and once that round reaches `Established`. Without
    /// this, a `Finished` seen in an earlier completed round would stay
    /// latched and make `IgnoreUntilFinished` stop ignoring HelloRequest
    /// during the next round's accumulating server flight.
    pub fn reset_for_new_round(&mut self) {
        self.messages_in_flight = 0;
        self.saw_finished = false;
    }

    pub fn has_partial_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// Feeds newly-received Handshake-record plaintext in, returning every
    /// complete message it releases under `policy`.
    pub fn push(&mut self, data: &[u8], policy: HelloRequestPolicy) -> Result<Vec<HandshakeMessage>> {
        self.data.extend_from_slice(data);
        let mut out = Vec::new();

        loop {
            if self.data.len() < 4 {
                break;
            }
            let ty_code = self.data[0];
            let len = u32::from_be_bytes([0, self.data[1], self.data[2], self.data[3]]) as usize;
            if self.data.len() < 4 + len {
                break;
            }

            let raw: Vec<u8> = self.data.drain(0..4 + len).collect();
            let body = raw[4..].to_vec();
            let ty = HandshakeType::from_code(ty_code)
                .ok_or_else(|| TlsError::local(AlertDescription::UnexpectedMessage))?;

            if ty == HandshakeType::HelloRequest {
                match policy {
                    HelloRequestPolicy::Accept => {}
                    HelloRequestPolicy::IgnoreAlways => continue,
                    HelloRequestPolicy::IgnoreUntilFinished => {
                        if !self.saw_finished {
                            continue;
                        }
                    }
                }
            }

            if ty == HandshakeType::Finished {
                self.saw_finished = true;
            }

            self.messages_in_flight += 1;
            if self.messages_in_flight > MAX_MESSAGES_PER_FLIGHT {
                return Err(TlsError::local(AlertDescription::UnexpectedMessage));
            }

            out.push(HandshakeMessage { ty, raw, body });
        }

        Ok(out)
    }
}

impl Default for HandshakeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::messages::wrap;

    fn msg(ty: HandshakeType, body: &[u8]) -> Vec<u8> {
        wrap(ty, body)
    }

    #[test]
    fn message_split_across_multiple_pushes_is_reassembled() {
        let raw = msg(HandshakeType::ServerHelloDone, &[]);
        let mut buf = HandshakeBuffer::new();

        let first_half = &raw[..2];
        let second_half = &raw[2..];
        assert!(buf.push(first_half, HelloRequestPolicy::Accept).unwrap().is_empty());
        let out = buf.push(second_half, HelloRequestPolicy::Accept).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ty, HandshakeType::ServerHelloDone);
        assert_eq!(out[0].raw, raw);
    }

    #[test]
    fn two_messages_in_one_push_both_emitted() {
        let mut raw = msg(HandshakeType::ServerHelloDone, &[]);
        raw.extend(msg(HandshakeType::Finished, &[0u8; 12]));
        let mut buf = HandshakeBuffer::new();
        let out = buf.push(&raw, HelloRequestPolicy::Accept).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].ty, HandshakeType::Finished);
    }

    #[test]
    fn sixth_message_in_flight_is_fatal() {
        let mut buf = HandshakeBuffer::new();
        let mut raw = Vec::new();
        for _ in 0..6 {
            raw.extend(msg(HandshakeType::CertificateRequest, &[]));
        }
        let err = buf.push(&raw, HelloRequestPolicy::Accept).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::UnexpectedMessage));
    }

    #[test]
    fn hello_request_ignore_always_is_dropped() {
        let raw = msg(HandshakeType::HelloRequest, &[]);
        let mut buf = HandshakeBuffer::new();
        let out = buf.push(&raw, HelloRequestPolicy::IgnoreAlways).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn hello_request_ignore_until_finished_then_accepted() {
        let mut buf = HandshakeBuffer::new();
        let hr = msg(HandshakeType::HelloRequest, &[]);
        assert!(buf
            .push(&hr, HelloRequestPolicy::IgnoreUntilFinished)
            .unwrap()
            .is_empty());

        let finished = msg(HandshakeType::Finished, &[0u8; 12]);
        let out = buf
            .push(&finished, HelloRequestPolicy::IgnoreUntilFinished)
            .unwrap();
        assert_eq!(out.len(), 1);

        let hr2 = msg(HandshakeType::HelloRequest, &[]);
        let out2 = buf
            .push(&hr2, HelloRequestPolicy::IgnoreUntilFinished)
            .unwrap();
        assert_eq!(out2.len(), 1);
        assert_eq!(out2[0].ty, HandshakeType::HelloRequest);
    }

    #[test]
    fn reset_for_new_round_clears_the_saw_finished_latch() {
        let mut buf = HandshakeBuffer::new();
        let finished = msg(HandshakeType::Finished, &[0u8; 12]);
        buf.push(&finished, HelloRequestPolicy::IgnoreUntilFinished).unwrap();

        // Without a reset, a later round's accumulating server flight would
        // immediately stop ignoring HelloRequest because of the earlier
        // round's Finished.
        buf.reset_for_new_round();

        let hr = msg(HandshakeType::HelloRequest, &[]);
        let out = buf
            .push(&hr, HelloRequestPolicy::IgnoreUntilFinished)
            .unwrap();
        assert!(out.is_empty());
    }
}
