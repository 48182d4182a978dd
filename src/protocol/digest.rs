//! Client id derivation
//!
//! A pending public client is named by hashing the textual form of its
//! remote endpoint with SHA-256 and keeping the first four bytes.

use super::types::ClientId;
use sha2::{Digest as Sha2Digest, Sha256};
use std::net::SocketAddr;

/// Hash arbitrary bytes down to a [`ClientId`]
///
/// ```
/// use pika::protocol::client_id_of;
///
/// let id = client_id_of(b"test");
/// assert_eq!(id.get(), 0x9f86_d081);
/// ```
pub fn client_id_of(data: &[u8]) -> ClientId {
    let d = Sha256::new().chain_update(data).finalize();
    let mut prefix = [0u8; 4];
    prefix.copy_from_slice(&d[..4]);
    ClientId::new(u32::from_be_bytes(prefix))
}

/// Derive the id of a public client from its remote endpoint
pub fn client_id_for(peer: &SocketAddr) -> ClientId {
    client_id_of(peer.to_string().as_bytes())
}
