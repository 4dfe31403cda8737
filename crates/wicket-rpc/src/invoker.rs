//! The outbound invocation seam.
//!
//! Concrete transports implement this; everything above it (forwarders,
//! servants talking to back ends) holds an `Arc<dyn Invoker>`.

use crate::error::WicketResult;
use crate::proxy::Proxy;
use crate::request::OutgoingRequest;
use async_trait::async_trait;

#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke twoway: resolves with the encoded reply payload, or the
    /// exception the target raised.
    async fn invoke(&self, proxy: &Proxy, request: OutgoingRequest) -> WicketResult<Vec<u8>>;

    /// Send oneway or datagram. Resolves once the transport has accepted
    /// the bytes for delivery, not when the call was queued. Callers that
    /// await this inherit the transport's flow control.
    async fn send(&self, proxy: &Proxy, request: OutgoingRequest) -> WicketResult<()>;
}
