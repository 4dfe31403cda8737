//! Raw requests as they cross the dispatch boundary.
//!
//! Parameter payloads are owned byte buffers, not views into transport
//! buffers: a forwarded request can outlive the buffer it arrived in.

use crate::connection::Connection;
use crate::identity::Identity;
use crate::proxy::InvokeMode;
use std::collections::BTreeMap;

/// Per-invocation key/value metadata, ordered.
pub type Context = BTreeMap<String, String>;

/// An inbound request handed to a servant's dispatch.
///
/// `request_id` is the transport's reply-correlation id; zero means the
/// client is not waiting for a reply (a oneway dispatch).
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub connection: Connection,
    pub request_id: i64,
    pub identity: Identity,
    pub facet: String,
    pub operation: String,
    pub context: Context,
    pub params: Vec<u8>,
}

impl IncomingRequest {
    pub fn twoway(
        connection: Connection,
        identity: Identity,
        operation: impl Into<String>,
        params: Vec<u8>,
    ) -> Self {
        Self {
            connection,
            request_id: 1,
            identity,
            facet: String::new(),
            operation: operation.into(),
            context: Context::new(),
            params,
        }
    }

    pub fn oneway(
        connection: Connection,
        identity: Identity,
        operation: impl Into<String>,
        params: Vec<u8>,
    ) -> Self {
        Self {
            request_id: 0,
            ..Self::twoway(connection, identity, operation, params)
        }
    }

    pub fn is_oneway(&self) -> bool {
        self.request_id == 0
    }
}

/// What the forwarder replays onto the outbound proxy.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub operation: String,
    pub mode: InvokeMode,
    pub context: Context,
    pub params: Vec<u8>,
}
