//! Per-session filter bundle and its remotely reachable servants.

use crate::config::{AddUserMode, FilterSection};
use crate::filter::sorted_set::SortedSetFilter;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use wicket_rpc::{
    decode_params, empty_params, encode_params, Identity, IncomingRequest, Object, ObjectAdapter,
    Proxy, WicketError, WicketResult,
};

/// Exposes one filter as a remote object with `add`/`remove`/`get`.
struct FilterServant<T> {
    filter: Arc<SortedSetFilter<T>>,
}

#[async_trait]
impl<T> Object for FilterServant<T>
where
    T: Ord + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn dispatch(&self, request: IncomingRequest) -> WicketResult<Vec<u8>> {
        match request.operation.as_str() {
            "add" => {
                let items: Vec<T> = decode_params(&request.params)?;
                self.filter.add(&items);
                Ok(empty_params())
            }
            "remove" => {
                let items: Vec<T> = decode_params(&request.params)?;
                self.filter.remove(&items);
                Ok(empty_params())
            }
            "get" => encode_params(&self.filter.items()),
            other => Err(WicketError::OperationNotExist(other.to_string())),
        }
    }
}

/// One session's three allow-lists, owned together and reachable remotely
/// so the client can adjust them at runtime.
pub struct FilterManager {
    categories: Arc<SortedSetFilter<String>>,
    adapter_ids: Arc<SortedSetFilter<String>>,
    identities: Arc<SortedSetFilter<Identity>>,
    categories_proxy: Proxy,
    adapter_ids_proxy: Proxy,
    identities_proxy: Proxy,
    adapter: Arc<dyn ObjectAdapter>,
    destroyed: AtomicBool,
}

impl FilterManager {
    /// Build the three filters from their config seeds and register their
    /// servants under fresh opaque identities.
    pub fn new(
        section: &FilterSection,
        user_id: &str,
        adapter: Arc<dyn ObjectAdapter>,
    ) -> WicketResult<Self> {
        let mut category_seed = section.categories.clone();
        match section.add_user_to_categories {
            AddUserMode::Off => {}
            AddUserMode::UserId => category_seed.push(user_id.to_string()),
            AddUserMode::PrefixedUserId => category_seed.push(format!("_{user_id}")),
        }

        let mut identity_seed = Vec::with_capacity(section.identities.len());
        for entry in &section.identities {
            identity_seed.push(Identity::parse(entry)?);
        }

        let categories = Arc::new(SortedSetFilter::new(category_seed));
        let adapter_ids = Arc::new(SortedSetFilter::new(section.adapter_ids.clone()));
        let identities = Arc::new(SortedSetFilter::new(identity_seed));

        let categories_proxy = adapter.add_with_uuid(Arc::new(FilterServant {
            filter: categories.clone(),
        }))?;
        let adapter_ids_proxy = adapter.add_with_uuid(Arc::new(FilterServant {
            filter: adapter_ids.clone(),
        }))?;
        let identities_proxy = adapter.add_with_uuid(Arc::new(FilterServant {
            filter: identities.clone(),
        }))?;

        Ok(Self {
            categories,
            adapter_ids,
            identities,
            categories_proxy,
            adapter_ids_proxy,
            identities_proxy,
            adapter,
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn categories(&self) -> &SortedSetFilter<String> {
        &self.categories
    }

    pub fn adapter_ids(&self) -> &SortedSetFilter<String> {
        &self.adapter_ids
    }

    pub fn identities(&self) -> &SortedSetFilter<Identity> {
        &self.identities
    }

    pub fn categories_proxy(&self) -> &Proxy {
        &self.categories_proxy
    }

    pub fn adapter_ids_proxy(&self) -> &Proxy {
        &self.adapter_ids_proxy
    }

    pub fn identities_proxy(&self) -> &Proxy {
        &self.identities_proxy
    }

    /// Unregister the three servants. Best-effort: a servant already gone
    /// or an adapter already shut down is not an error here.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        for proxy in [
            &self.categories_proxy,
            &self.adapter_ids_proxy,
            &self.identities_proxy,
        ] {
            if let Err(e) = self.adapter.remove(&proxy.identity) {
                if e.is_benign_teardown() {
                    debug!(identity = %proxy.identity, "filter servant already unregistered");
                } else {
                    warn!(identity = %proxy.identity, error = %e, "failed to unregister filter servant");
                }
            }
        }
    }
}
