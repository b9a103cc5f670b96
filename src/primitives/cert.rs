//! X.509 chain builder adapter (§4.1, §4.5 "Certificate"). Parses the DER
//! chain the server sent, checks validity periods, matches the leaf against
//! the configured hostname, and extracts the leaf's public key so the
//! handshake engine can verify `ServerKeyExchange`/use it for RSA/ECDH
//! key exchange.

use rsa::{BigUint, RsaPublicKey};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::{FromDer, GeneralName};

use crate::primitives::sign::PublicKey;

/// Per-certificate status produced while walking a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Ok,
    NotTimeValid,
    Revoked,
    RevocationStatusUnknown,
    Other,
}

pub struct BuiltChain {
    pub leaf_public_key: PublicKey,
    /// One status per certificate in the chain, leaf first.
    pub statuses: Vec<CertStatus>,
}

#[derive(Debug)]
pub enum CertError {
    Decode,
    EmptyChain,
    UnsupportedKeyType,
}

/// Parses and validates the DER chain (leaf first, as Certificate messages
/// carry it). This client does not itself perform revocation checking
/// (OCSP/CRL fetching is a network side-channel outside this crate's
/// transport-agnostic scope) so every certificate is reported
/// `RevocationStatusUnknown` rather than `Revoked`/`Ok` on that axis; time
/// validity is checked directly against the DER `Validity` fields.
pub fn build_chain(der_certs: &[Vec<u8>]) -> Result<BuiltChain, CertError> {
    if der_certs.is_empty() {
        return Err(CertError::EmptyChain);
    }

    let mut statuses = Vec::with_capacity(der_certs.len());
    let mut leaf_public_key = None;

    for (i, der) in der_certs.iter().enumerate() {
        let (_, cert) = X509Certificate::from_der(der).map_err(|_| CertError::Decode)?;

        let status = if !cert.validity().is_valid() {
            CertStatus::NotTimeValid
        } else {
            CertStatus::RevocationStatusUnknown
        };
        statuses.push(status);

        if i == 0 {
            leaf_public_key = Some(extract_public_key(&cert)?);
        }
    }

    Ok(BuiltChain {
        leaf_public_key: leaf_public_key.expect("checked non-empty above"),
        statuses,
    })
}

fn extract_public_key(cert: &X509Certificate) -> Result<PublicKey, CertError> {
    let spki = &cert.tbs_certificate.subject_pki;
    let alg_oid = spki.algorithm.algorithm.to_string();

    match alg_oid.as_str() {
        // rsaEncryption
        "1.2.840.113549.1.1.1" => {
            let parsed = spki.parsed().map_err(|_| CertError::Decode)?;
            let rsa_key = match parsed {
                x509_parser::public_key::PublicKey::RSA(rsa_key) => rsa_key,
                _ => return Err(CertError::Decode),
            };
            let n = BigUint::from_bytes_be(rsa_key.modulus);
            let e = BigUint::from_bytes_be(rsa_key.exponent);
            let key = RsaPublicKey::new(n, e).map_err(|_| CertError::Decode)?;
            Ok(PublicKey::Rsa(key))
        }
        // id-ecPublicKey
        "1.2.840.10045.2.1" => {
            let point = spki.subject_public_key.data.as_ref();
            // Curve comes from the algorithm's namedCurve parameter; both
            // P-256 and P-384 OIDs are matched, P-521 ECDSA verification is
            // intentionally not wired up (only ECDHE/ECDH static keys use it).
            if let Some(params) = &spki.algorithm.parameters {
                let curve_oid = params.as_oid().map(|o| o.to_string()).unwrap_or_default();
                return match curve_oid.as_str() {
                    "1.2.840.10045.3.1.7" => p256::ecdsa::VerifyingKey::from_sec1_bytes(point)
                        .map(PublicKey::EcdsaP256)
                        .map_err(|_| CertError::Decode),
                    "1.3.132.0.34" => p384::ecdsa::VerifyingKey::from_sec1_bytes(point)
                        .map(PublicKey::EcdsaP384)
                        .map_err(|_| CertError::Decode),
                    _ => Err(CertError::UnsupportedKeyType),
                };
            }
            Err(CertError::UnsupportedKeyType)
        }
        // id-dsa
        "1.2.840.10040.4.1" => Err(CertError::UnsupportedKeyType),
        _ => Err(CertError::UnsupportedKeyType),
    }
}

/// Matches `hostname` against the leaf certificate's SAN dNSName entries
/// (falling back to the subject Common Name when no SAN is present), per
/// §4.5 "checks hostname match against the leaf". IP-literal hostnames are
/// never passed in here (the handshake engine suppresses SNI/hostname
/// checks for those, §4.5 ClientHello).
pub fn hostname_matches(leaf_der: &[u8], hostname: &str) -> bool {
    let Ok((_, cert)) = X509Certificate::from_der(leaf_der) else {
        return false;
    };

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        let mut any_dns = false;
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                any_dns = true;
                if dns_name_matches(dns, hostname) {
                    return true;
                }
            }
        }
        if any_dns {
            return false;
        }
    }

    let subject = cert.subject();
    let matched = subject
        .iter_common_name()
        .filter_map(|cn| cn.as_str().ok())
        .any(|cn| dns_name_matches(cn, hostname));
    matched
}

fn dns_name_matches(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let hostname = hostname.to_ascii_lowercase();
    if let Some(rest) = pattern.strip_prefix("*.") {
        let mut labels = hostname.splitn(2, '.');
        let _first_label = labels.next();
        return labels.next() == Some(rest);
    }
    pattern == hostname
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_wildcard_matches_single_label() {
        assert!(dns_name_matches("*.example.com", "www.example.com"));
        assert!(!dns_name_matches("*.example.com", "a.b.example.com"));
        assert!(!dns_name_matches("*.example.com", "example.com"));
    }

    #[test]
    fn dns_exact_match_is_case_insensitive() {
        assert!(dns_name_matches("Example.com", "example.COM"));
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(matches!(build_chain(&[]), Err(CertError::EmptyChain)));
    }
}
