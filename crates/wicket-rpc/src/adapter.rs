//! Object adapters: where servants live and inbound dispatch lands.

use crate::endpoint::Endpoint;
use crate::error::{WicketError, WicketResult};
use crate::identity::Identity;
use crate::proxy::Proxy;
use crate::request::IncomingRequest;
use async_trait::async_trait;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// A locally registered servant.
#[async_trait]
pub trait Object: Send + Sync {
    /// Dispatch one inbound request, returning the encoded reply payload.
    /// Implementations must not panic across this boundary; failures come
    /// back as errors.
    async fn dispatch(&self, request: IncomingRequest) -> WicketResult<Vec<u8>>;
}

/// Registry of servants reachable under this process's endpoints.
pub trait ObjectAdapter: Send + Sync {
    /// A proxy for `identity` with this adapter's published endpoints.
    /// The identity need not be registered yet.
    fn create_proxy(&self, identity: Identity) -> WicketResult<Proxy>;

    fn add(&self, servant: Arc<dyn Object>, identity: Identity) -> WicketResult<Proxy>;

    /// Register under a freshly generated opaque identity.
    fn add_with_uuid(&self, servant: Arc<dyn Object>) -> WicketResult<Proxy>;

    fn remove(&self, identity: &Identity) -> WicketResult<Arc<dyn Object>>;

    fn find(&self, identity: &Identity) -> Option<Arc<dyn Object>>;
}

/// In-process adapter backing tests and embeddings without a transport.
pub struct LocalAdapter {
    published: Vec<Endpoint>,
    servants: RwLock<HashMap<Identity, Arc<dyn Object>>>,
    deactivated: AtomicBool,
}

impl LocalAdapter {
    pub fn new(published: Vec<Endpoint>) -> Arc<Self> {
        Arc::new(Self {
            published,
            servants: RwLock::new(HashMap::new()),
            deactivated: AtomicBool::new(false),
        })
    }

    /// After deactivation every mutator fails with `AdapterDeactivated`.
    pub fn deactivate(&self) {
        self.deactivated.store(true, Ordering::SeqCst);
    }

    fn check_active(&self) -> WicketResult<()> {
        if self.deactivated.load(Ordering::SeqCst) {
            Err(WicketError::AdapterDeactivated("local adapter".into()))
        } else {
            Ok(())
        }
    }

    /// Route an inbound request to its servant's dispatch.
    pub async fn dispatch(&self, request: IncomingRequest) -> WicketResult<Vec<u8>> {
        let servant = self
            .find(&request.identity)
            .ok_or_else(|| WicketError::NotFound(request.identity.to_string()))?;
        servant.dispatch(request).await
    }
}

impl ObjectAdapter for LocalAdapter {
    fn create_proxy(&self, identity: Identity) -> WicketResult<Proxy> {
        self.check_active()?;
        Ok(Proxy::new(identity).with_endpoints(self.published.clone()))
    }

    fn add(&self, servant: Arc<dyn Object>, identity: Identity) -> WicketResult<Proxy> {
        self.check_active()?;
        let mut servants = self.servants.write().unwrap();
        servants.insert(identity.clone(), servant);
        Ok(Proxy::new(identity).with_endpoints(self.published.clone()))
    }

    fn add_with_uuid(&self, servant: Arc<dyn Object>) -> WicketResult<Proxy> {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        self.add(servant, Identity::new(hex::encode(bytes), ""))
    }

    fn remove(&self, identity: &Identity) -> WicketResult<Arc<dyn Object>> {
        self.check_active()?;
        let mut servants = self.servants.write().unwrap();
        servants
            .remove(identity)
            .ok_or_else(|| WicketError::NotRegistered(identity.to_string()))
    }

    fn find(&self, identity: &Identity) -> Option<Arc<dyn Object>> {
        let servants = self.servants.read().unwrap();
        servants.get(identity).cloned()
    }
}
