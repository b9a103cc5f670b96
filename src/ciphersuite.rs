//! The static, compiled-in list of ciphersuites this client offers and can
//! negotiate. Each entry fully determines the record layer's cipher mode
//! and key-block layout (§3, §4.3).

/// Key-exchange family. CertificateVerify signer dispatch and
/// ServerKeyExchange presence both key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    Rsa,
    Dhe,
    Ecdhe,
    EcdhRsa,
    EcdhEcdsa,
}

impl KeyExchangeAlgorithm {
    /// ServerKeyExchange is only sent for ephemeral key exchanges.
    pub fn expects_server_key_exchange(self) -> bool {
        matches!(self, KeyExchangeAlgorithm::Dhe | KeyExchangeAlgorithm::Ecdhe)
    }

    pub fn is_forward_secret(self) -> bool {
        matches!(self, KeyExchangeAlgorithm::Dhe | KeyExchangeAlgorithm::Ecdhe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Null,
    Cbc,
    Gcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrfHash {
    Sha256,
    Sha384,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    pub id: u16,
    pub name: &'static str,
    pub key_exchange: KeyExchangeAlgorithm,
    pub mode: CipherMode,
    pub prf_hash: PrfHash,
    /// AES key length in bytes (16 or 32). Zero for the null cipher.
    pub key_len: usize,
    /// MAC length in bytes: 20 (SHA-1), 32/48 (SHA-256/384 HMAC), 0 for GCM.
    pub mac_len: usize,
    /// AES block length, 16 for all suites here.
    pub block_len: usize,
    /// Explicit per-record IV carried in the key block (GCM: 4-byte salt; CBC: 0, IV is random per record).
    pub fixed_iv_len: usize,
}

impl CipherSuite {
    pub fn by_id(id: u16) -> Option<&'static CipherSuite> {
        SUPPORTED.iter().find(|s| s.id == id)
    }
}

/// The epoch every connection starts in before any handshake completes
/// (§3 "`ConnectionState` ... null cipher"). Never negotiated on the wire.
pub static NULL_CIPHER: CipherSuite = CipherSuite {
    id: 0x0000,
    name: "TLS_NULL_WITH_NULL_NULL",
    key_exchange: KeyExchangeAlgorithm::Rsa,
    mode: CipherMode::Null,
    prf_hash: PrfHash::Sha256,
    key_len: 0,
    mac_len: 0,
    block_len: 16,
    fixed_iv_len: 0,
};

pub static SUPPORTED: &[CipherSuite] = &[
    CipherSuite {
        id: 0xc02f,
        name: "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        key_exchange: KeyExchangeAlgorithm::Ecdhe,
        mode: CipherMode::Gcm,
        prf_hash: PrfHash::Sha256,
        key_len: 16,
        mac_len: 0,
        block_len: 16,
        fixed_iv_len: 4,
    },
    CipherSuite {
        id: 0xc030,
        name: "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        key_exchange: KeyExchangeAlgorithm::Ecdhe,
        mode: CipherMode::Gcm,
        prf_hash: PrfHash::Sha384,
        key_len: 32,
        mac_len: 0,
        block_len: 16,
        fixed_iv_len: 4,
    },
    CipherSuite {
        id: 0xc02b,
        name: "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        key_exchange: KeyExchangeAlgorithm::Ecdhe,
        mode: CipherMode::Gcm,
        prf_hash: PrfHash::Sha256,
        key_len: 16,
        mac_len: 0,
        block_len: 16,
        fixed_iv_len: 4,
    },
    CipherSuite {
        id: 0xc02c,
        name: "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        key_exchange: KeyExchangeAlgorithm::Ecdhe,
        mode: CipherMode::Gcm,
        prf_hash: PrfHash::Sha384,
        key_len: 32,
        mac_len: 0,
        block_len: 16,
        fixed_iv_len: 4,
    },
    CipherSuite {
        id: 0xc013,
        name: "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        key_exchange: KeyExchangeAlgorithm::Ecdhe,
        mode: CipherMode::Cbc,
        prf_hash: PrfHash::Sha256,
        key_len: 16,
        mac_len: 20,
        block_len: 16,
        fixed_iv_len: 0,
    },
    CipherSuite {
        id: 0xc014,
        name: "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        key_exchange: KeyExchangeAlgorithm::Ecdhe,
        mode: CipherMode::Cbc,
        prf_hash: PrfHash::Sha256,
        key_len: 32,
        mac_len: 20,
        block_len: 16,
        fixed_iv_len: 0,
    },
    CipherSuite {
        id: 0x0033,
        name: "TLS_DHE_RSA_WITH_AES_128_CBC_SHA",
        key_exchange: KeyExchangeAlgorithm::Dhe,
        mode: CipherMode::Cbc,
        prf_hash: PrfHash::Sha256,
        key_len: 16,
        mac_len: 20,
        block_len: 16,
        fixed_iv_len: 0,
    },
    CipherSuite {
        id: 0x009e,
        name: "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256",
        key_exchange: KeyExchangeAlgorithm::Dhe,
        mode: CipherMode::Gcm,
        prf_hash: PrfHash::Sha256,
        key_len: 16,
        mac_len: 0,
        block_len: 16,
        fixed_iv_len: 4,
    },
    CipherSuite {
        id: 0x002f,
        name: "TLS_RSA_WITH_AES_128_CBC_SHA",
        key_exchange: KeyExchangeAlgorithm::Rsa,
        mode: CipherMode::Cbc,
        prf_hash: PrfHash::Sha256,
        key_len: 16,
        mac_len: 20,
        block_len: 16,
        fixed_iv_len: 0,
    },
    CipherSuite {
        id: 0x0035,
        name: "TLS_RSA_WITH_AES_256_CBC_SHA",
        key_exchange: KeyExchangeAlgorithm::Rsa,
        mode: CipherMode::Cbc,
        prf_hash: PrfHash::Sha256,
        key_len: 32,
        mac_len: 20,
        block_len: 16,
        fixed_iv_len: 0,
    },
    CipherSuite {
        id: 0x009c,
        name: "TLS_RSA_WITH_AES_128_GCM_SHA256",
        key_exchange: KeyExchangeAlgorithm::Rsa,
        mode: CipherMode::Gcm,
        prf_hash: PrfHash::Sha256,
        key_len: 16,
        mac_len: 0,
        block_len: 16,
        fixed_iv_len: 4,
    },
    CipherSuite {
        id: 0xc00a,
        name: "TLS_ECDH_ECDSA_WITH_AES_256_CBC_SHA",
        key_exchange: KeyExchangeAlgorithm::EcdhEcdsa,
        mode: CipherMode::Cbc,
        prf_hash: PrfHash::Sha256,
        key_len: 32,
        mac_len: 20,
        block_len: 16,
        fixed_iv_len: 0,
    },
    CipherSuite {
        id: 0xc004,
        name: "TLS_ECDH_RSA_WITH_AES_128_CBC_SHA",
        key_exchange: KeyExchangeAlgorithm::EcdhRsa,
        mode: CipherMode::Cbc,
        prf_hash: PrfHash::Sha256,
        key_len: 16,
        mac_len: 20,
        block_len: 16,
        fixed_iv_len: 0,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_id() {
        let s = CipherSuite::by_id(0xc02f).unwrap();
        assert_eq!(s.name, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256");
        assert_eq!(s.mode, CipherMode::Gcm);
    }

    #[test]
    fn lookup_unknown_id() {
        assert!(CipherSuite::by_id(0xffff).is_none());
    }

    #[test]
    fn every_suite_has_nonzero_block_len() {
        for s in SUPPORTED {
            assert_eq!(s.block_len, 16);
        }
    }
}
