//! The authentication seam.
//!
//! The gateway never checks credentials itself; it hands them to this
//! collaborator once per session creation. Implementations may be remote
//! and slow, so the call is async and the coordinator never holds a lock
//! across it. Deadlines belong here too: wrap the backend call in a
//! timeout and return `NotAuthorized` rather than hanging the queue.

use async_trait::async_trait;
use wicket_rpc::{Connection, Context, Proxy, WicketResult};

/// What a successful authorization hands back.
#[derive(Debug, Clone, Default)]
pub struct AuthGrant {
    /// Attached to forwarded calls when the per-direction context
    /// forwarding toggles are on.
    pub context: Context,
    /// The back-end session object to release when this session ends.
    pub backend_session: Option<Proxy>,
}

#[async_trait]
pub trait SessionAuthorizer: Send + Sync {
    /// Decide whether `user_id`/`credential` may open a session on
    /// `connection`. Rejection is `Err(WicketError::NotAuthorized)`.
    async fn authorize(
        &self,
        user_id: &str,
        credential: &str,
        connection: &Connection,
    ) -> WicketResult<AuthGrant>;

    /// Release whatever `authorize` allocated. Called once per destroyed
    /// session, fire-and-forget.
    async fn release(&self, user_id: &str, backend_session: Option<Proxy>) -> WicketResult<()> {
        let _ = (user_id, backend_session);
        Ok(())
    }
}
