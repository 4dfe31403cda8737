//! Metrics observer seam.
//!
//! The gateway reports two counters outward and consumes nothing back.
//! No observer configured means every notification is a no-op.

use std::sync::{Arc, Mutex};

pub trait RouterObserver: Send + Sync {
    /// One request was forwarded; `client` distinguishes the direction
    /// (true = client toward back end, false = back end toward client).
    fn forwarded(&self, client: bool);

    /// The routing table grew or shrank by `delta` entries.
    fn routing_table_size(&self, delta: i32);
}

/// Swappable observer handle shared by a session and its routing table,
/// so rebinding the observer takes effect everywhere at once.
#[derive(Clone, Default)]
pub struct SharedObserver {
    inner: Arc<Mutex<Option<Arc<dyn RouterObserver>>>>,
}

impl SharedObserver {
    pub fn new(observer: Option<Arc<dyn RouterObserver>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(observer)),
        }
    }

    /// Replace the active observer and return the now-active handle.
    pub fn set(
        &self,
        observer: Option<Arc<dyn RouterObserver>>,
    ) -> Option<Arc<dyn RouterObserver>> {
        let mut slot = self.inner.lock().unwrap();
        *slot = observer;
        slot.clone()
    }

    pub fn current(&self) -> Option<Arc<dyn RouterObserver>> {
        self.inner.lock().unwrap().clone()
    }

    pub fn forwarded(&self, client: bool) {
        if let Some(observer) = self.current() {
            observer.forwarded(client);
        }
    }

    pub fn routing_table_size(&self, delta: i32) {
        if delta == 0 {
            return;
        }
        if let Some(observer) = self.current() {
            observer.routing_table_size(delta);
        }
    }
}
