//! A client-side TLS 1.2 protocol engine (RFC 5246): handshake state
//! machine, record layer, and the connection controller tying them
//! together. Transport-agnostic — the embedder supplies any
//! `Read + Write` and drives `Connection` themselves, mirroring how
//! `brontide::Machine` never touches a socket directly.

pub mod ciphersuite;
pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod prf;
pub mod primitives;
pub mod record;
pub mod wire;

pub use config::ClientConfig;
pub use connection::Connection;
pub use error::{AlertDescription, Result, TlsError};
