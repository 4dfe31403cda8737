//! wicket-rpc: RPC substrate for the wicket gateway.
//!
//! Provides object identities, endpoints, proxies, connection handles, raw
//! request types, the CBOR parameter codec, and the two traits concrete
//! transports implement: `Invoker` (outbound) and `ObjectAdapter`/`Object`
//! (inbound dispatch).

pub mod adapter;
pub mod codec;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod identity;
pub mod invoker;
pub mod proxy;
pub mod request;

// Re-export commonly used items at crate root.
pub use adapter::{LocalAdapter, Object, ObjectAdapter};
pub use codec::{decode_params, empty_params, encode_params};
pub use connection::{Connection, ConnectionId};
pub use endpoint::Endpoint;
pub use error::{WicketError, WicketResult};
pub use identity::Identity;
pub use invoker::Invoker;
pub use proxy::{InvokeMode, Proxy};
pub use request::{Context, IncomingRequest, OutgoingRequest};
