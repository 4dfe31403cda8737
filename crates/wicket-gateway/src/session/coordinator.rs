//! Session creation, lookup, and teardown.
//!
//! One mutex guards the three maps: sessions keyed by connection,
//! sessions keyed by callback category, and the waiter lists for
//! creations still in flight. The authentication round-trip and session
//! assembly run outside the lock; concurrent `create_session` calls for
//! the same connection coalesce onto the in-flight attempt and every
//! caller observes its outcome, so one connection never triggers more
//! than one authentication at a time.

use crate::auth::AuthGrant;
use crate::filter::FilterManager;
use crate::forward::ForwardOutcome;
use crate::instance::Instance;
use crate::session::{SessionControl, SessionRouter};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use wicket_rpc::{
    Connection, ConnectionId, Identity, IncomingRequest, WicketError, WicketResult,
};

type CreateWaiter = oneshot::Sender<WicketResult<Arc<SessionRouter>>>;

#[derive(Default)]
struct CoordinatorState {
    by_connection: HashMap<ConnectionId, Arc<SessionRouter>>,
    by_category: HashMap<String, Arc<SessionRouter>>,
    pending: HashMap<ConnectionId, Vec<CreateWaiter>>,
    shutting_down: bool,
}

/// A routed request's destination: the session it belongs to and the
/// direction it travels through that session.
pub struct RoutedTarget {
    session: Arc<SessionRouter>,
    client: bool,
}

impl RoutedTarget {
    pub fn session(&self) -> &Arc<SessionRouter> {
        &self.session
    }

    /// True when the request came in on the session's own connection and
    /// heads toward the back end, false for a back-end callback.
    pub fn is_client_side(&self) -> bool {
        self.client
    }

    pub async fn forward(&self, request: &IncomingRequest) -> WicketResult<ForwardOutcome> {
        if self.client {
            self.session.forward_client(request).await
        } else {
            self.session.forward_server(request).await
        }
    }
}

impl fmt::Debug for RoutedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedTarget")
            .field("session", &self.session)
            .field("client", &self.client)
            .finish()
    }
}

pub struct SessionCoordinator {
    instance: Instance,
    state: Mutex<CoordinatorState>,
}

/// Removes the pending-creation entry if the leading task is dropped
/// before it publishes an outcome; queued callers then observe the
/// abandonment instead of waiting on senders nobody holds.
struct PendingGuard<'a> {
    coordinator: &'a SessionCoordinator,
    connection: ConnectionId,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.coordinator.state.lock().unwrap();
            state.pending.remove(&self.connection);
        }
    }
}

impl SessionCoordinator {
    pub(crate) fn new(instance: Instance) -> Arc<Self> {
        Arc::new(Self {
            instance,
            state: Mutex::new(CoordinatorState::default()),
        })
    }

    /// Create (or join the in-flight creation of) the session for
    /// `connection`. A connection that already has a live session gets a
    /// fresh one; the old session is destroyed.
    pub async fn create_session(
        self: &Arc<Self>,
        user_id: &str,
        credential: &str,
        connection: &Connection,
    ) -> WicketResult<Arc<SessionRouter>> {
        // Phase 1: become the leader for this connection, or queue behind
        // the attempt already running.
        enum Role {
            Leader(Option<Arc<SessionRouter>>),
            Follower(oneshot::Receiver<WicketResult<Arc<SessionRouter>>>),
        }
        let role = {
            let mut state = self.state.lock().unwrap();
            if state.shutting_down {
                return Err(WicketError::Other("gateway is shutting down".into()));
            }
            match state.pending.get_mut(&connection.id()) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Role::Follower(rx)
                }
                None => {
                    state.pending.insert(connection.id(), Vec::new());
                    let replaced = state.by_connection.remove(&connection.id());
                    if let Some(old) = &replaced {
                        if let Some(category) = old.category() {
                            state.by_category.remove(category);
                        }
                    }
                    Role::Leader(replaced)
                }
            }
        };

        let replaced = match role {
            Role::Follower(rx) => {
                debug!(connection = %connection, "joining in-flight session creation");
                // A dropped sender means the leading task went away before
                // publishing an outcome.
                return rx
                    .await
                    .map_err(|_| WicketError::Other("session creation abandoned".into()))?;
            }
            Role::Leader(replaced) => replaced,
        };
        let mut guard = PendingGuard {
            coordinator: self,
            connection: connection.id(),
            armed: true,
        };
        if let Some(old) = replaced {
            info!(
                connection = %connection,
                user = old.user_id(),
                "new session replaces the existing one on this connection"
            );
            old.destroy();
        }

        let mut outcome = self.build_session(user_id, credential, connection).await;

        // Phase 2: publish under the lock, then fan the outcome out to
        // every queued caller.
        let (waiters, doomed) = {
            let mut state = self.state.lock().unwrap();
            let waiters = state.pending.remove(&connection.id()).unwrap_or_default();
            let mut doomed = None;
            if let Ok(router) = &outcome {
                if state.shutting_down {
                    doomed = Some(router.clone());
                } else {
                    state.by_connection.insert(connection.id(), router.clone());
                    if let Some(category) = router.category() {
                        state.by_category.insert(category.to_string(), router.clone());
                    }
                }
            }
            (waiters, doomed)
        };
        guard.armed = false;
        if let Some(router) = doomed {
            router.destroy();
            outcome = Err(WicketError::Other("gateway is shutting down".into()));
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        outcome
    }

    /// The leader's work: authenticate, then assemble the session. Runs
    /// with no coordinator lock held.
    async fn build_session(
        self: &Arc<Self>,
        user_id: &str,
        credential: &str,
        connection: &Connection,
    ) -> WicketResult<Arc<SessionRouter>> {
        info!(user = %user_id, connection = %connection, "authenticating session");
        let grant = match self
            .instance
            .authorizer
            .authorize(user_id, credential, connection)
            .await
        {
            Ok(grant) => grant,
            Err(e) => {
                warn!(user = %user_id, connection = %connection, error = %e, "authentication failed");
                return Err(e);
            }
        };
        let backend = grant.backend_session.clone();

        let router = match self.assemble_router(user_id, connection, grant) {
            Ok(router) => router,
            Err(e) => {
                // Authentication succeeded but the session never formed;
                // give the back end its resource back.
                let authorizer = self.instance.authorizer.clone();
                let user = user_id.to_string();
                tokio::spawn(async move {
                    if let Err(release_err) = authorizer.release(&user, backend).await {
                        warn!(user = %user, error = %release_err, "back-end session release failed");
                    }
                });
                return Err(e);
            }
        };

        // The connection may have died during the authentication
        // round-trip; a session bound to it would never carry traffic.
        if connection.is_aborted() {
            router.destroy();
            return Err(WicketError::Transport(
                "connection closed during session creation".into(),
            ));
        }
        Ok(router)
    }

    fn assemble_router(
        self: &Arc<Self>,
        user_id: &str,
        connection: &Connection,
        grant: AuthGrant,
    ) -> WicketResult<Arc<SessionRouter>> {
        let filters = FilterManager::new(
            &self.instance.config.filters,
            user_id,
            self.instance.adapter.clone(),
        )?;
        let control = SessionControl::new(Arc::downgrade(self), connection.clone(), &filters);
        let control_proxy = match self.instance.adapter.add_with_uuid(Arc::new(control)) {
            Ok(proxy) => proxy,
            Err(e) => {
                filters.destroy();
                return Err(e);
            }
        };
        match SessionRouter::new(
            &self.instance,
            user_id.to_string(),
            connection.clone(),
            grant,
            control_proxy.clone(),
            filters,
        ) {
            Ok(router) => Ok(router),
            Err(e) => {
                if let Err(remove_err) = self.instance.adapter.remove(&control_proxy.identity) {
                    if remove_err.is_benign_teardown() {
                        debug!(identity = %control_proxy.identity, "control servant already unregistered");
                    } else {
                        warn!(
                            identity = %control_proxy.identity,
                            error = %remove_err,
                            "failed to unregister control servant"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Resolve an inbound request to a session and direction: the
    /// connection a client session is bound to wins, then the identity's
    /// category against the callback categories.
    pub fn route(&self, connection: &Connection, identity: &Identity) -> WicketResult<RoutedTarget> {
        let state = self.state.lock().unwrap();
        if let Some(session) = state.by_connection.get(&connection.id()) {
            return Ok(RoutedTarget {
                session: session.clone(),
                client: true,
            });
        }
        if let Some(session) = state.by_category.get(&identity.category) {
            return Ok(RoutedTarget {
                session: session.clone(),
                client: false,
            });
        }
        Err(WicketError::NotFound(format!(
            "no session for {connection} or category {:?}",
            identity.category
        )))
    }

    /// Route and forward in one step.
    pub async fn dispatch(&self, request: &IncomingRequest) -> WicketResult<ForwardOutcome> {
        self.route(&request.connection, &request.identity)?
            .forward(request)
            .await
    }

    /// Explicit teardown, client- or administratively-driven. `NotFound`
    /// when the connection has no session.
    pub fn destroy_session(&self, connection: &Connection) -> WicketResult<()> {
        let session = self
            .take_session(connection)
            .ok_or_else(|| WicketError::NotFound(format!("no session bound to {connection}")))?;
        session.destroy();
        Ok(())
    }

    /// Transport-driven teardown. Never an error: most connections that
    /// close simply never had a session.
    pub fn on_connection_closed(&self, connection: &Connection) {
        // The abort mark must land before the map lookup: a creation still
        // in flight has no session here yet and only re-checks the
        // connection right before registering.
        connection.abort();
        if let Some(session) = self.take_session(connection) {
            debug!(connection = %connection, "connection closed, destroying its session");
            session.destroy();
        }
    }

    fn take_session(&self, connection: &Connection) -> Option<Arc<SessionRouter>> {
        let mut state = self.state.lock().unwrap();
        let session = state.by_connection.remove(&connection.id())?;
        if let Some(category) = session.category() {
            state.by_category.remove(category);
        }
        Some(session)
    }

    pub fn session_for(&self, connection: &Connection) -> Option<Arc<SessionRouter>> {
        self.state
            .lock()
            .unwrap()
            .by_connection
            .get(&connection.id())
            .cloned()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().by_connection.len()
    }

    /// Stop accepting sessions and destroy every live one. Creations in
    /// flight resolve with an error instead of registering.
    pub fn destroy(&self) {
        let sessions: Vec<_> = {
            let mut state = self.state.lock().unwrap();
            state.shutting_down = true;
            state.by_category.clear();
            state.by_connection.drain().map(|(_, s)| s).collect()
        };
        if !sessions.is_empty() {
            info!(count = sessions.len(), "destroying all sessions");
        }
        for session in sessions {
            session.destroy();
        }
    }
}
