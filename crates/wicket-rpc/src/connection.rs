//! Inbound connection handles.
//!
//! The gateway never owns connections; the transport does. What circulates
//! here is a cheap clonable handle carrying the process-unique id the
//! session maps are keyed by, the peer address for authorization, and the
//! abort switch the security boundary pulls.

use crate::identity::Identity;
use crate::proxy::Proxy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct ConnectionState {
    id: ConnectionId,
    remote_host: String,
    remote_port: u16,
    aborted: AtomicBool,
}

/// Handle to one live inbound connection.
#[derive(Debug, Clone)]
pub struct Connection(Arc<ConnectionState>);

impl Connection {
    pub fn new(remote_host: impl Into<String>, remote_port: u16) -> Self {
        Self(Arc::new(ConnectionState {
            id: ConnectionId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            remote_host: remote_host.into(),
            remote_port,
            aborted: AtomicBool::new(false),
        }))
    }

    pub fn id(&self) -> ConnectionId {
        self.0.id
    }

    pub fn remote_host(&self) -> &str {
        &self.0.remote_host
    }

    pub fn remote_port(&self) -> u16 {
        self.0.remote_port
    }

    /// Forcefully close the connection. Idempotent; the transport tears
    /// down the socket and will deliver its closed notification once.
    pub fn abort(&self) {
        self.0.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.aborted.load(Ordering::SeqCst)
    }

    /// A proxy for `identity` fixed to this connection: invocations on it
    /// travel back over this connection rather than out to an endpoint.
    pub fn create_proxy(&self, identity: Identity) -> Proxy {
        Proxy::new(identity).fixed_to(self.id())
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Connection {}

impl std::hash::Hash for Connection {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conn {} ({}:{})",
            self.0.id, self.0.remote_host, self.0.remote_port
        )
    }
}
