//! The per-session control servant.
//!
//! Registered under an opaque generated identity at session creation; the
//! client gets its proxy back and uses it to end the session or to reach
//! the three mutable filters. It holds the coordinator weakly so a
//! half-torn-down gateway answers `destroy` with a benign error instead
//! of keeping itself alive.

use crate::filter::FilterManager;
use crate::session::SessionCoordinator;
use async_trait::async_trait;
use std::sync::Weak;
use wicket_rpc::{codec, Connection, IncomingRequest, Object, Proxy, WicketError, WicketResult};

pub struct SessionControl {
    coordinator: Weak<SessionCoordinator>,
    connection: Connection,
    categories_proxy: Proxy,
    adapter_ids_proxy: Proxy,
    identities_proxy: Proxy,
}

impl SessionControl {
    pub(crate) fn new(
        coordinator: Weak<SessionCoordinator>,
        connection: Connection,
        filters: &FilterManager,
    ) -> Self {
        Self {
            coordinator,
            connection,
            categories_proxy: filters.categories_proxy().clone(),
            adapter_ids_proxy: filters.adapter_ids_proxy().clone(),
            identities_proxy: filters.identities_proxy().clone(),
        }
    }
}

#[async_trait]
impl Object for SessionControl {
    async fn dispatch(&self, request: IncomingRequest) -> WicketResult<Vec<u8>> {
        match request.operation.as_str() {
            "getCategoryFilter" => codec::encode_params(&self.categories_proxy),
            "getAdapterIdFilter" => codec::encode_params(&self.adapter_ids_proxy),
            "getIdentityFilter" => codec::encode_params(&self.identities_proxy),
            "destroy" => {
                let coordinator = self
                    .coordinator
                    .upgrade()
                    .ok_or(WicketError::SessionDestroyed)?;
                coordinator.destroy_session(&self.connection)?;
                Ok(codec::empty_params())
            }
            other => Err(WicketError::OperationNotExist(other.to_string())),
        }
    }
}
