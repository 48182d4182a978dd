//! Pending-client registries
//!
//! Each reverse tunnel owns one [`PendingClients`] map from [`ClientId`] to
//! the public socket waiting for the exporter. The controller keeps a
//! [`TunnelDirectory`] of the registries of live tunnels so a
//! `ConnectWithId` arriving on a fresh connection can find its client.
//!
//! A client id is pending in at most one tunnel at a time. Inserts go
//! through the tunnel's [`TunnelRegistration`], which checks every live
//! registry under the directory lock before parking the socket.
//!
//! Entries are never evicted by time. An unclaimed socket stays until its
//! tunnel ends, at which point dropping the registry closes it.

use crate::protocol::ClientId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpStream;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Public sockets of one reverse tunnel awaiting their pairing request
#[derive(Debug, Default)]
pub struct PendingClients {
    clients: Mutex<HashMap<ClientId, TcpStream>>,
}

impl PendingClients {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket under `id`
    ///
    /// An id that is still pending is never overwritten; the new socket is
    /// handed back instead.
    pub fn insert(&self, id: ClientId, stream: TcpStream) -> Result<(), TcpStream> {
        let mut clients = lock(&self.clients);
        if clients.contains_key(&id) {
            return Err(stream);
        }
        clients.insert(id, stream);
        Ok(())
    }

    /// Remove and return the socket registered under `id`
    pub fn claim(&self, id: ClientId) -> Option<TcpStream> {
        lock(&self.clients).remove(&id)
    }

    /// Whether `id` is pending
    pub fn contains(&self, id: ClientId) -> bool {
        lock(&self.clients).contains_key(&id)
    }

    /// Number of pending clients
    pub fn len(&self) -> usize {
        lock(&self.clients).len()
    }

    /// Whether no client is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registries of every live reverse tunnel on one controller
#[derive(Debug, Clone, Default)]
pub struct TunnelDirectory {
    tunnels: Arc<Mutex<HashMap<u64, Arc<PendingClients>>>>,
    next_key: Arc<AtomicU64>,
}

/// Keeps a tunnel's registry listed in the directory until dropped
#[derive(Debug)]
pub struct TunnelRegistration {
    key: u64,
    registry: Arc<PendingClients>,
    tunnels: Arc<Mutex<HashMap<u64, Arc<PendingClients>>>>,
}

impl TunnelDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// List `registry` until the returned guard is dropped
    pub fn register(&self, registry: Arc<PendingClients>) -> TunnelRegistration {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        lock(&self.tunnels).insert(key, registry.clone());
        TunnelRegistration {
            key,
            registry,
            tunnels: self.tunnels.clone(),
        }
    }

    /// Remove `id` from the live tunnel holding it
    pub fn claim(&self, id: ClientId) -> Option<TcpStream> {
        lock(&self.tunnels)
            .values()
            .find_map(|registry| registry.claim(id))
    }

    /// Number of live tunnels
    pub fn tunnel_count(&self) -> usize {
        lock(&self.tunnels).len()
    }
}

impl TunnelRegistration {
    /// Park `stream` under `id` in this tunnel's registry
    ///
    /// Refused while `id` is pending in any live tunnel of the directory, so
    /// a `ConnectWithId` always names exactly one socket. The directory lock
    /// is taken before the registry locks, in the same order as
    /// [`TunnelDirectory::claim`].
    pub fn insert(&self, id: ClientId, stream: TcpStream) -> Result<(), TcpStream> {
        let tunnels = lock(&self.tunnels);
        if tunnels.values().any(|registry| registry.contains(id)) {
            return Err(stream);
        }
        self.registry.insert(id, stream)
    }

    /// This tunnel's registry
    pub fn registry(&self) -> &PendingClients {
        &self.registry
    }
}

impl Drop for TunnelRegistration {
    fn drop(&mut self) {
        lock(&self.tunnels).remove(&self.key);
    }
}
