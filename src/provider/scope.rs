//! Scope caches and their teardown.
//!
//! Singleton and private services live in the process-wide cache, request
//! services in a cache that [`ScopeManager::end_request`] empties. Each
//! cached id owns a `OnceCell`, so concurrent first requests for the same id
//! run exactly one construction while other ids proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::binding::Binding;
use crate::error::{DiError, DiResult};
use crate::internal::CleanupBag;
use crate::lifetime::Scope;
use crate::value::Instance;

type Slot = Arc<OnceCell<Instance>>;

#[derive(Default)]
struct ScopeCache {
    slots: RwLock<HashMap<String, Slot>>,
    cleanup: Mutex<CleanupBag>,
}

impl ScopeCache {
    fn slot(&self, id: &str) -> Slot {
        if let Some(slot) = self.slots.read().get(id) {
            return slot.clone();
        }
        self.slots.write().entry(id.to_string()).or_default().clone()
    }

    fn get_or_create<F>(&self, id: &str, build: F) -> DiResult<Instance>
    where
        F: FnOnce() -> DiResult<Instance>,
    {
        let slot = self.slot(id);
        if let Some(instance) = slot.get() {
            return Ok(instance.clone());
        }
        let mut created = false;
        let instance = slot
            .get_or_try_init(|| {
                let instance = build()?;
                created = true;
                Ok::<_, DiError>(instance)
            })?
            .clone();
        if created {
            self.cleanup.lock().push(id, instance.clone());
        }
        Ok(instance)
    }

    fn get(&self, id: &str) -> Option<Instance> {
        self.slots.read().get(id).and_then(|slot| slot.get().cloned())
    }

    fn insert(&self, id: &str, instance: Instance) {
        self.slots
            .write()
            .insert(id.to_string(), Arc::new(OnceCell::with_value(instance)));
    }

    fn len(&self) -> usize {
        self.slots.read().values().filter(|slot| slot.get().is_some()).count()
    }

    /// Empties the cache and runs cleanup hooks, newest first.
    fn drain(&self) -> Vec<String> {
        let mut bag = self.cleanup.lock().take();
        self.slots.write().clear();
        bag.run_all_reverse()
    }
}

/// Caching policy per scope.
#[derive(Default)]
pub(crate) struct ScopeManager {
    singletons: ScopeCache,
    requests: ScopeCache,
}

impl ScopeManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance for `binding`, or runs `build` under the
    /// binding's scope policy. A failed build leaves the slot empty.
    pub(crate) fn get_or_create<F>(&self, binding: &Binding, build: F) -> DiResult<Instance>
    where
        F: FnOnce() -> DiResult<Instance>,
    {
        match binding.scope {
            Scope::Proxy => Err(DiError::NotImplemented(format!("proxy scope ('{}')", binding.id))),
            _ if !binding.is_cached() => build(),
            Scope::Request => self.requests.get_or_create(&binding.id, build),
            _ => self.singletons.get_or_create(&binding.id, build),
        }
    }

    /// A cached instance, without building.
    pub(crate) fn cached(&self, id: &str) -> Option<Instance> {
        self.singletons.get(id).or_else(|| self.requests.get(id))
    }

    /// Stores a pre-built singleton. Pre-built instances are not cleaned up
    /// by the container.
    pub(crate) fn insert_singleton(&self, id: &str, instance: Instance) {
        self.singletons.insert(id, instance);
    }

    pub(crate) fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub(crate) fn end_request(&self) -> Vec<String> {
        self.requests.drain()
    }

    /// Ends the current request, then tears down every singleton.
    pub(crate) fn shutdown(&self) -> Vec<String> {
        let mut order = self.requests.drain();
        order.extend(self.singletons.drain());
        order
    }
}
