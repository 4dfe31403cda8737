//! Bounded, LRU-evicting map from object identity to callback proxy.

use crate::observer::SharedObserver;
use crate::rules::ProxyVerifier;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use wicket_rpc::{Connection, Identity, Proxy, WicketError, WicketResult};

/// One session's forwarding targets.
///
/// The map and the recency queue are kept in strict 1:1 correspondence
/// under one lock; the queue's front is always the next eviction victim.
pub struct RoutingTable {
    verifier: Arc<ProxyVerifier>,
    observer: SharedObserver,
    max_size: usize,
    inner: Mutex<TableInner>,
}

struct TableInner {
    entries: HashMap<Identity, Proxy>,
    recency: VecDeque<Identity>,
}

impl RoutingTable {
    pub fn new(verifier: Arc<ProxyVerifier>, observer: SharedObserver, max_size: usize) -> Self {
        Self {
            verifier,
            observer,
            max_size,
            inner: Mutex::new(TableInner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
            }),
        }
    }

    /// Insert or refresh a batch of proxies, returning whatever got evicted.
    ///
    /// Every proxy is first brought to canonical twoway/no-facet form and
    /// checked against the address rules. One bad proxy fails the whole
    /// batch and aborts the connection that sent it: a client holding a
    /// session has no honest reason to register an out-of-policy address.
    /// Capacity is enforced after each insertion, so an oversized batch
    /// still converges to `max_size`.
    pub fn add(
        &self,
        connection: &Connection,
        proxies: &[Option<Proxy>],
    ) -> WicketResult<Vec<Proxy>> {
        let batch: Vec<Proxy> = proxies
            .iter()
            .flatten()
            .map(|p| p.as_twoway().without_facet())
            .collect();

        for proxy in &batch {
            if !self.verifier.verify(proxy) {
                warn!(
                    proxy = %proxy.stringified(),
                    conn = %connection.id(),
                    "proxy rejected by address rules, aborting connection"
                );
                connection.abort();
                return Err(WicketError::NotAuthorized(format!(
                    "proxy {} rejected by address rules",
                    proxy.stringified()
                )));
            }
        }

        let added = batch.len();
        let mut evicted = Vec::new();
        let mut delta: i32 = 0;
        {
            let mut inner = self.inner.lock().unwrap();
            for proxy in batch {
                let key = proxy.identity.clone();
                if inner.entries.insert(key.clone(), proxy).is_some() {
                    inner.recency.retain(|id| id != &key);
                } else {
                    delta += 1;
                }
                inner.recency.push_back(key);

                while inner.entries.len() > self.max_size {
                    if let Some(victim) = inner.recency.pop_front() {
                        if let Some(proxy) = inner.entries.remove(&victim) {
                            debug!(identity = %victim, "routing entry evicted");
                            evicted.push(proxy);
                            delta -= 1;
                        }
                    } else {
                        break;
                    }
                }
            }
        }

        debug!(added, evicted = evicted.len(), "routing table updated");
        self.observer.routing_table_size(delta);
        Ok(evicted)
    }

    /// Look up the proxy for `identity`, refreshing its recency.
    pub fn get(&self, identity: &Identity) -> Option<Proxy> {
        let mut inner = self.inner.lock().unwrap();
        let proxy = inner.entries.get(identity)?.clone();
        inner.recency.retain(|id| id != identity);
        inner.recency.push_back(identity.clone());
        Some(proxy)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, reporting the shrink to the observer.
    pub fn destroy(&self) {
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            let removed = inner.entries.len();
            inner.entries.clear();
            inner.recency.clear();
            removed
        };
        self.observer.routing_table_size(-(removed as i32));
    }
}
