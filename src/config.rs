//! Embedder-supplied configuration. A plain struct built directly by the
//! caller, not a builder or a deserialised document.

use crate::ciphersuite::SUPPORTED;
use crate::primitives::cert::CertStatus;
use crate::primitives::sign::ClientSigningKey;

/// `(leaf_and_chain, per_certificate_status) -> bool`, consulted only when
/// the built-in chain policy would otherwise reject the connection (§4.5).
pub type VerifyCallback = dyn Fn(&[Vec<u8>], &[CertStatus]) -> bool + Send + Sync;

pub struct ClientConfig {
    /// Suppresses SNI and (approximately) hostname checking when `None` or
    /// when set to an IP literal (§4.5 "omit for IP literals").
    pub hostname: Option<String>,
    /// DER-encoded chain, leaf first. Empty when the client has nothing to
    /// offer; a CertificateRequest is then answered with an empty
    /// Certificate message rather than skipped (§4.5 "empty chain if no
    /// suitable cert").
    pub client_certificate_chain: Vec<Vec<u8>>,
    pub client_private_key: Option<ClientSigningKey>,
    pub verify_callback: Option<Box<VerifyCallback>>,
    /// RFC 5746 strict mode: fatal if the peer's initial ServerHello omits
    /// `renegotiation_info` entirely (§4.5).
    pub strict_renegotiation: bool,
    /// Resolves the §9 open question: whether a chain whose only blemish
    /// is `RevocationStatusUnknown` is fatal. Default `false`, matching the
    /// spec's observed source behaviour.
    pub treat_unknown_revocation_as_fatal: bool,
    /// Ciphersuite IDs offered in ClientHello, in preference order.
    pub offered_suites: Vec<u16>,
}

impl ClientConfig {
    pub fn new(hostname: Option<String>) -> Self {
        ClientConfig {
            hostname,
            client_certificate_chain: Vec::new(),
            client_private_key: None,
            verify_callback: None,
            strict_renegotiation: false,
            treat_unknown_revocation_as_fatal: false,
            offered_suites: SUPPORTED.iter().map(|s| s.id).collect(),
        }
    }

    pub fn is_ip_literal(&self) -> bool {
        match &self.hostname {
            Some(h) => h.parse::<std::net::IpAddr>().is_ok(),
            None => false,
        }
    }

    /// The SNI `server_name` value to advertise, or `None` when no
    /// hostname is configured or it's an IP literal.
    pub fn sni_hostname(&self) -> Option<&str> {
        match &self.hostname {
            Some(h) if !self.is_ip_literal() => Some(h.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_literal_suppresses_sni() {
        let cfg = ClientConfig::new(Some("127.0.0.1".to_string()));
        assert!(cfg.is_ip_literal());
        assert_eq!(cfg.sni_hostname(), None);
    }

    #[test]
    fn hostname_enables_sni() {
        let cfg = ClientConfig::new(Some("example.com".to_string()));
        assert!(!cfg.is_ip_literal());
        assert_eq!(cfg.sni_hostname(), Some("example.com"));
    }

    #[test]
    fn default_offers_every_compiled_in_suite() {
        let cfg = ClientConfig::new(None);
        assert_eq!(cfg.offered_suites.len(), SUPPORTED.len());
    }
}
