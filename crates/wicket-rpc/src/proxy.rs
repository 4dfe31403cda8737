//! Remote object references.
//!
//! A `Proxy` is a plain value: cloning one and flipping an attribute is how
//! callers derive the twoway/oneway/secure variants they need, so every
//! conversion method here returns a modified copy.

use crate::connection::ConnectionId;
use crate::endpoint::Endpoint;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// How an invocation on a proxy travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvokeMode {
    Twoway,
    Oneway,
    BatchOneway,
    Datagram,
    BatchDatagram,
}

impl InvokeMode {
    /// Only twoway invocations carry a reply.
    pub fn expects_reply(&self) -> bool {
        matches!(self, InvokeMode::Twoway)
    }

    fn flag(&self) -> &'static str {
        match self {
            InvokeMode::Twoway => "-t",
            InvokeMode::Oneway => "-o",
            InvokeMode::BatchOneway => "-O",
            InvokeMode::Datagram => "-d",
            InvokeMode::BatchDatagram => "-D",
        }
    }
}

/// A reference to a remote object: who it is, how to reach it, and how
/// calls on it should travel.
///
/// A proxy either carries endpoints (routable toward a back end) or is
/// fixed to one live connection (callback traffic riding an inbound
/// connection back to its client). The two are mutually exclusive in
/// practice but not enforced structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub identity: Identity,
    /// Selected facet; empty means the default facet.
    pub facet: String,
    pub mode: InvokeMode,
    pub secure: bool,
    pub compress: bool,
    pub endpoints: Vec<Endpoint>,
    /// Indirect addressing: reach the object via a named adapter instead
    /// of literal endpoints. Empty when endpoints are used.
    pub adapter_id: String,
    /// Present when the proxy is bound to a specific live connection.
    pub fixed_connection: Option<ConnectionId>,
}

impl Proxy {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            facet: String::new(),
            mode: InvokeMode::Twoway,
            secure: false,
            compress: false,
            endpoints: Vec::new(),
            adapter_id: String::new(),
            fixed_connection: None,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_adapter_id(mut self, adapter_id: impl Into<String>) -> Self {
        self.adapter_id = adapter_id.into();
        self
    }

    pub fn with_mode(&self, mode: InvokeMode) -> Self {
        let mut p = self.clone();
        p.mode = mode;
        p
    }

    pub fn as_twoway(&self) -> Self {
        self.with_mode(InvokeMode::Twoway)
    }

    pub fn as_oneway(&self) -> Self {
        self.with_mode(InvokeMode::Oneway)
    }

    pub fn as_datagram(&self) -> Self {
        self.with_mode(InvokeMode::Datagram)
    }

    pub fn with_facet(&self, facet: impl Into<String>) -> Self {
        let mut p = self.clone();
        p.facet = facet.into();
        p
    }

    pub fn without_facet(&self) -> Self {
        self.with_facet("")
    }

    pub fn with_secure(&self, secure: bool) -> Self {
        let mut p = self.clone();
        p.secure = secure;
        p
    }

    pub fn with_compress(&self, compress: bool) -> Self {
        let mut p = self.clone();
        p.compress = compress;
        p
    }

    /// Bind this proxy to a live connection, clearing any routing
    /// information it carried.
    pub fn fixed_to(&self, connection: ConnectionId) -> Self {
        let mut p = self.clone();
        p.fixed_connection = Some(connection);
        p.endpoints.clear();
        p.adapter_id.clear();
        p
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed_connection.is_some()
    }

    /// Render the reference form whose length the size rule measures,
    /// e.g. `printers/p1 -f tab -t -s @ 10.0.0.5:443 10.0.0.6:443`.
    pub fn stringified(&self) -> String {
        let mut s = self.identity.to_string();
        if !self.facet.is_empty() {
            let _ = write!(s, " -f {}", self.facet);
        }
        let _ = write!(s, " {}", self.mode.flag());
        if self.secure {
            s.push_str(" -s");
        }
        if self.compress {
            s.push_str(" -z");
        }
        if !self.adapter_id.is_empty() {
            let _ = write!(s, " @ {}", self.adapter_id);
        } else if !self.endpoints.is_empty() {
            s.push_str(" @");
            for ep in &self.endpoints {
                let _ = write!(s, " {ep}");
            }
        }
        s
    }
}
