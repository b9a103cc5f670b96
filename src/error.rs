use std::{error, fmt, io};

/// The closed set of alert descriptions this engine can raise or recognise.
///
/// Only the subset RFC 5246 assigns that this client actually produces or
/// consumes is represented; anything else arriving on the wire is mapped to
/// the closest member here before being surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    RecordOverflow,
    HandshakeFailure,
    IllegalParameter,
    DecodeError,
    DecryptError,
    ProtocolVersion,
    CertificateExpired,
    CertificateRevoked,
    CertificateUnknown,
    InternalError,
}

impl AlertDescription {
    /// Wire value as carried in an Alert record's second byte.
    pub fn code(self) -> u8 {
        use AlertDescription::*;
        match self {
            CloseNotify => 0,
            UnexpectedMessage => 10,
            BadRecordMac => 20,
            RecordOverflow => 22,
            HandshakeFailure => 40,
            IllegalParameter => 47,
            DecodeError => 50,
            DecryptError => 51,
            ProtocolVersion => 70,
            CertificateExpired => 45,
            CertificateRevoked => 44,
            CertificateUnknown => 46,
            InternalError => 80,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use AlertDescription::*;
        Some(match code {
            0 => CloseNotify,
            10 => UnexpectedMessage,
            20 => BadRecordMac,
            22 => RecordOverflow,
            40 => HandshakeFailure,
            44 => CertificateRevoked,
            45 => CertificateExpired,
            46 => CertificateUnknown,
            47 => IllegalParameter,
            50 => DecodeError,
            51 => DecryptError,
            70 => ProtocolVersion,
            80 => InternalError,
            _ => return None,
        })
    }

    /// Every alert here is fatal except close_notify, which is an orderly
    /// shutdown signal rather than an error.
    pub fn is_fatal(self) -> bool {
        !matches!(self, AlertDescription::CloseNotify)
    }
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} (alert {})", self, self.code())
    }
}

/// Errors surfaced across the public API.
///
/// `Protocol` covers everything the engine itself decided to raise or that
/// the peer sent us in a fatal Alert record; `Io` covers the transport.
/// There is no retry path for either — TLS 1.2 gives none.
#[derive(Debug)]
pub enum TlsError {
    Protocol {
        description: AlertDescription,
        /// true when the alert was received from the peer rather than raised locally.
        from_peer: bool,
    },
    Io(io::Error),
}

impl TlsError {
    pub fn local(description: AlertDescription) -> Self {
        TlsError::Protocol {
            description,
            from_peer: false,
        }
    }

    pub fn peer(description: AlertDescription) -> Self {
        TlsError::Protocol {
            description,
            from_peer: true,
        }
    }

    pub fn description(&self) -> Option<AlertDescription> {
        match self {
            TlsError::Protocol { description, .. } => Some(*description),
            TlsError::Io(_) => None,
        }
    }
}

impl error::Error for TlsError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            TlsError::Io(e) => Some(e),
            TlsError::Protocol { .. } => None,
        }
    }
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TlsError::Protocol {
                description,
                from_peer,
            } => {
                let who = if *from_peer { "peer" } else { "local" };
                write!(f, "{} alert: {}", who, description)
            }
            TlsError::Io(e) => write!(f, "transport error: {}", e),
        }
    }
}

impl From<io::Error> for TlsError {
    fn from(e: io::Error) -> Self {
        TlsError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, TlsError>;
