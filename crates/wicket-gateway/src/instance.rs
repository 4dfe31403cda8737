//! Shared gateway state handed to every session.

use crate::auth::SessionAuthorizer;
use crate::config::GatewayConfig;
use crate::observer::SharedObserver;
use crate::rules::ProxyVerifier;
use std::sync::Arc;
use wicket_rpc::{Invoker, ObjectAdapter, WicketResult};

/// Everything a session needs from its gateway: the compiled address
/// rules (shared read-only), the adapters, the outbound invoker, the
/// authentication collaborator, and the gateway-wide observer that seeds
/// each session's own observer handle.
pub(crate) struct Instance {
    pub config: GatewayConfig,
    pub adapter: Arc<dyn ObjectAdapter>,
    pub server_adapter: Option<Arc<dyn ObjectAdapter>>,
    pub invoker: Arc<dyn Invoker>,
    pub authorizer: Arc<dyn SessionAuthorizer>,
    pub verifier: Arc<ProxyVerifier>,
    pub observer: SharedObserver,
}

impl Instance {
    pub fn new(
        config: GatewayConfig,
        adapter: Arc<dyn ObjectAdapter>,
        server_adapter: Option<Arc<dyn ObjectAdapter>>,
        invoker: Arc<dyn Invoker>,
        authorizer: Arc<dyn SessionAuthorizer>,
        observer: SharedObserver,
    ) -> WicketResult<Self> {
        config.validate()?;
        let verifier = Arc::new(ProxyVerifier::new(
            &config.routing.accept,
            &config.routing.reject,
            config.routing.max_proxy_length,
        )?);
        Ok(Self {
            config,
            adapter,
            server_adapter,
            invoker,
            authorizer,
            verifier,
            observer,
        })
    }
}
