//! The gateway's remotely reachable face.
//!
//! One shared servant dispatches the session-management operations every
//! client starts with; all per-session state lives behind the coordinator
//! it fronts. Data-plane traffic does not pass through here, it goes to
//! `SessionCoordinator::dispatch`.

use crate::session::SessionCoordinator;
use async_trait::async_trait;
use std::sync::Arc;
use wicket_rpc::{codec, IncomingRequest, Object, Proxy, WicketError, WicketResult};

pub struct RouterServant {
    coordinator: Arc<SessionCoordinator>,
}

impl RouterServant {
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Object for RouterServant {
    async fn dispatch(&self, request: IncomingRequest) -> WicketResult<Vec<u8>> {
        match request.operation.as_str() {
            "createSession" => {
                let (user_id, credential): (String, String) =
                    codec::decode_params(&request.params)?;
                let session = self
                    .coordinator
                    .create_session(&user_id, &credential, &request.connection)
                    .await?;
                codec::encode_params(&session.backend_session().cloned())
            }
            "destroySession" => {
                self.coordinator.destroy_session(&request.connection)?;
                Ok(codec::empty_params())
            }
            "addProxies" => {
                let proxies: Vec<Option<Proxy>> = codec::decode_params(&request.params)?;
                let session = self
                    .coordinator
                    .session_for(&request.connection)
                    .ok_or(WicketError::SessionDestroyed)?;
                let evicted = session.add_proxies(&proxies)?;
                codec::encode_params(&evicted)
            }
            "getCategoryForClient" => {
                let session = self
                    .coordinator
                    .session_for(&request.connection)
                    .ok_or(WicketError::SessionDestroyed)?;
                // Empty means the session accepts no callbacks.
                let category = session.category().unwrap_or("");
                codec::encode_params(&category)
            }
            "getClientProxy" => {
                // Client traffic rides the inbound connection itself; there
                // is no separate client-facing proxy to hand out.
                codec::encode_params(&Option::<Proxy>::None)
            }
            "getServerProxy" => {
                let session = self
                    .coordinator
                    .session_for(&request.connection)
                    .ok_or(WicketError::SessionDestroyed)?;
                codec::encode_params(&session.server_proxy().cloned())
            }
            other => Err(WicketError::OperationNotExist(other.to_string())),
        }
    }
}
