//! A session-aware reverse proxy for remote-object RPC traffic.
//!
//! Clients authenticate once to obtain a session; from then on the gateway
//! forwards their requests to back-end objects they have registered, and
//! optionally routes back-end callbacks to them over their own inbound
//! connection. Address rules decide which back-end endpoints a session may
//! register; per-session filters decide which identities it may reach.
//!
//! The transport plugs in at two seams from `wicket-rpc`: inbound requests
//! arrive as [`wicket_rpc::IncomingRequest`] values handed to
//! [`Gateway::dispatch`] (or to the [`RouterServant`] for management
//! operations), and outbound calls leave through an
//! [`wicket_rpc::Invoker`] implementation.

mod instance;

pub mod auth;
pub mod config;
pub mod filter;
pub mod forward;
pub mod observer;
pub mod routing;
pub mod rules;
pub mod servant;
pub mod session;

pub use auth::{AuthGrant, SessionAuthorizer};
pub use config::{AddUserMode, FilterSection, ForwardSection, GatewayConfig, RoutingSection};
pub use filter::{FilterManager, SortedSetFilter};
pub use forward::{ForwardOutcome, RequestForwarder, FORWARD_KEY};
pub use observer::{RouterObserver, SharedObserver};
pub use routing::RoutingTable;
pub use rules::{AddressRule, ProxyVerifier};
pub use servant::RouterServant;
pub use session::{RoutedTarget, SessionCoordinator, SessionRouter, SessionState};

use instance::Instance;
use std::sync::Arc;
use wicket_rpc::{IncomingRequest, Invoker, ObjectAdapter, WicketResult};

/// The assembled gateway: configuration validated, address rules compiled
/// once, and a coordinator ready to create sessions.
pub struct Gateway {
    coordinator: Arc<SessionCoordinator>,
}

impl Gateway {
    /// Build a gateway. `adapter` hosts the control and filter servants;
    /// `server_adapter` is the back-end-facing adapter for callbacks, and
    /// leaving it out disables the callback path entirely. Fails on a
    /// malformed configuration.
    pub fn new(
        config: GatewayConfig,
        adapter: Arc<dyn ObjectAdapter>,
        server_adapter: Option<Arc<dyn ObjectAdapter>>,
        invoker: Arc<dyn Invoker>,
        authorizer: Arc<dyn SessionAuthorizer>,
        observer: Option<Arc<dyn RouterObserver>>,
    ) -> WicketResult<Self> {
        let instance = Instance::new(
            config,
            adapter,
            server_adapter,
            invoker,
            authorizer,
            SharedObserver::new(observer),
        )?;
        Ok(Self {
            coordinator: SessionCoordinator::new(instance),
        })
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    /// The servant to mount under the gateway's public identity.
    pub fn router_servant(&self) -> RouterServant {
        RouterServant::new(self.coordinator.clone())
    }

    /// Route and forward one data-plane request.
    pub async fn dispatch(&self, request: &IncomingRequest) -> WicketResult<ForwardOutcome> {
        self.coordinator.dispatch(request).await
    }

    /// Destroy every session and refuse new ones.
    pub fn destroy(&self) {
        self.coordinator.destroy();
    }
}
