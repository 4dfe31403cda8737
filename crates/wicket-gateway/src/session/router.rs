//! The per-session router.
//!
//! One `SessionRouter` exists per authenticated client. It owns the
//! session's routing table, its three mutable filters, and the forwarders
//! for both directions, and it drives the session through its lifecycle:
//! `Created → Active → Destroying → Destroyed`, forward-only.

use crate::auth::{AuthGrant, SessionAuthorizer};
use crate::filter::FilterManager;
use crate::forward::{ForwardOutcome, RequestForwarder};
use crate::instance::Instance;
use crate::observer::{RouterObserver, SharedObserver};
use crate::routing::RoutingTable;
use rand::RngCore;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wicket_rpc::{
    Connection, Identity, IncomingRequest, ObjectAdapter, Proxy, WicketError, WicketResult,
};

const CREATED: u8 = 0;
const ACTIVE: u8 = 1;
const DESTROYING: u8 = 2;
const DESTROYED: u8 = 3;

/// Where a session is in its lifecycle. Transitions only move forward;
/// `Destroying` and `Destroyed` are terminal for every forwarding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Destroying,
    Destroyed,
}

pub struct SessionRouter {
    user_id: String,
    connection: Connection,
    backend_session: Option<Proxy>,
    /// Callback category, present only when a server-facing adapter
    /// exists. Back-end requests whose identity carries this category
    /// route to this session.
    category: Option<String>,
    control_proxy: Proxy,
    server_proxy: Option<Proxy>,
    filters: FilterManager,
    table: RoutingTable,
    client_forwarder: RequestForwarder,
    server_forwarder: Option<RequestForwarder>,
    adapter: Arc<dyn ObjectAdapter>,
    authorizer: Arc<dyn SessionAuthorizer>,
    observer: SharedObserver,
    state: AtomicU8,
}

impl SessionRouter {
    pub(crate) fn new(
        instance: &Instance,
        user_id: String,
        connection: Connection,
        grant: AuthGrant,
        control_proxy: Proxy,
        filters: FilterManager,
    ) -> WicketResult<Arc<Self>> {
        // Each session gets its own observer handle, seeded from the
        // gateway-wide one; rebinding it later affects only this session.
        let observer = SharedObserver::new(instance.observer.current());
        let table = RoutingTable::new(
            instance.verifier.clone(),
            observer.clone(),
            instance.config.routing.max_table_size,
        );
        let client_forwarder = RequestForwarder::new(
            instance.invoker.clone(),
            true,
            instance.config.forward.client_context,
            grant.context.clone(),
        );
        let mut router = Self {
            user_id,
            connection,
            backend_session: grant.backend_session,
            category: None,
            control_proxy,
            server_proxy: None,
            filters,
            table,
            client_forwarder,
            server_forwarder: None,
            adapter: instance.adapter.clone(),
            authorizer: instance.authorizer.clone(),
            observer,
            state: AtomicU8::new(CREATED),
        };
        if let Some(server_adapter) = &instance.server_adapter {
            let category = callback_category();
            let server_proxy =
                match server_adapter.create_proxy(Identity::new("dummy", category.clone())) {
                    Ok(proxy) => proxy,
                    Err(e) => {
                        // The filter servants are already registered.
                        router.filters.destroy();
                        return Err(e);
                    }
                };
            router.server_proxy = Some(server_proxy);
            router.server_forwarder = Some(RequestForwarder::new(
                instance.invoker.clone(),
                false,
                instance.config.forward.server_context,
                grant.context,
            ));
            router.category = Some(category);
        }
        // Construction is complete, including the optional server side.
        router.state.store(ACTIVE, Ordering::SeqCst);
        info!(
            user = %router.user_id,
            connection = %router.connection,
            callbacks = router.category.is_some(),
            "session created"
        );
        Ok(Arc::new(router))
    }

    /// Forward a client request to the back-end object it was registered
    /// against. A filtered-out identity and an unregistered one produce
    /// the same `NotFound`: filters hide, they do not explain.
    pub async fn forward_client(&self, request: &IncomingRequest) -> WicketResult<ForwardOutcome> {
        self.check_active()?;
        let identity = &request.identity;
        if !self.filters.categories().matches(&identity.category)
            || !self.filters.identities().matches(identity)
        {
            debug!(user = %self.user_id, identity = %identity, "identity rejected by session filters");
            return Err(WicketError::NotFound(identity.to_string()));
        }
        let target = self
            .table
            .get(identity)
            .ok_or_else(|| WicketError::NotFound(identity.to_string()))?;
        if !target.adapter_id.is_empty() && !self.filters.adapter_ids().matches(&target.adapter_id)
        {
            debug!(
                user = %self.user_id,
                identity = %identity,
                adapter_id = %target.adapter_id,
                "adapter id rejected by session filters"
            );
            return Err(WicketError::NotFound(identity.to_string()));
        }
        self.observer.forwarded(true);
        self.client_forwarder.forward(&target, request).await
    }

    /// Forward a back-end callback to the client, riding the session's
    /// own connection back the way it came.
    pub async fn forward_server(&self, request: &IncomingRequest) -> WicketResult<ForwardOutcome> {
        self.check_active()?;
        let forwarder = self
            .server_forwarder
            .as_ref()
            .ok_or_else(|| WicketError::NotFound("session has no server side".into()))?;
        let target = self.connection.create_proxy(request.identity.clone());
        self.observer.forwarded(false);
        forwarder.forward(&target, request).await
    }

    /// Register proxies in the routing table; returns the entries evicted
    /// to make room so the caller can drop stale references.
    pub fn add_proxies(&self, proxies: &[Option<Proxy>]) -> WicketResult<Vec<Proxy>> {
        self.check_active()?;
        self.table.add(&self.connection, proxies)
    }

    /// Tear the session down. Idempotent: the first caller moves the state
    /// to `Destroying` and does the work, later callers return at once.
    /// Cleanup is best-effort; the back-end release runs detached.
    pub fn destroy(self: &Arc<Self>) {
        if self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                (s < DESTROYING).then_some(DESTROYING)
            })
            .is_err()
        {
            return;
        }
        info!(user = %self.user_id, connection = %self.connection, "destroying session");
        if let Err(e) = self.adapter.remove(&self.control_proxy.identity) {
            if e.is_benign_teardown() {
                debug!(identity = %self.control_proxy.identity, "control servant already unregistered");
            } else {
                warn!(identity = %self.control_proxy.identity, error = %e, "failed to unregister control servant");
            }
        }
        self.filters.destroy();
        self.table.destroy();
        let router = self.clone();
        tokio::spawn(async move {
            let backend = router.backend_session.clone();
            if let Err(e) = router.authorizer.release(&router.user_id, backend).await {
                warn!(user = %router.user_id, error = %e, "back-end session release failed");
            }
            router.state.store(DESTROYED, Ordering::SeqCst);
        });
    }

    /// Rebind this session's metrics observer; returns the now-active one.
    pub fn update_observer(
        &self,
        observer: Option<Arc<dyn RouterObserver>>,
    ) -> Option<Arc<dyn RouterObserver>> {
        self.observer.set(observer)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn control_proxy(&self) -> &Proxy {
        &self.control_proxy
    }

    /// Template proxy for callbacks: clients re-identify it to reach their
    /// own callback objects through the gateway's server-facing endpoints.
    pub fn server_proxy(&self) -> Option<&Proxy> {
        self.server_proxy.as_ref()
    }

    pub fn backend_session(&self) -> Option<&Proxy> {
        self.backend_session.as_ref()
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::SeqCst) {
            CREATED => SessionState::Created,
            ACTIVE => SessionState::Active,
            DESTROYING => SessionState::Destroying,
            _ => SessionState::Destroyed,
        }
    }

    fn check_active(&self) -> WicketResult<()> {
        if self.state.load(Ordering::SeqCst) >= DESTROYING {
            return Err(WicketError::SessionDestroyed);
        }
        Ok(())
    }
}

impl fmt::Debug for SessionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRouter")
            .field("user", &self.user_id)
            .field("connection", &self.connection)
            .field("category", &self.category)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// An opaque category for a session's callback objects. Random enough
/// that back-end peers cannot guess another session's category.
fn callback_category() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
