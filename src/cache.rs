//! Persisted binding graph.
//!
//! Resolving definitions into bindings is the expensive part of a build. A
//! [`GraphCache`] lets a later build reuse the resolved graph as an opaque
//! JSON blob, as long as the inputs it was resolved from have not changed.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::config::ContainerConfig;
use crate::error::{DiError, DiResult};
use crate::registration::Registry;
use crate::types::TypeRegistry;

/// Key/value store for the persisted graph.
///
/// Backends (files, remote stores) live outside this crate; they only need
/// to hand the blob back unchanged.
pub trait GraphCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, blob: String) -> DiResult<()>;
}

/// Process-local [`GraphCache`].
///
/// ```
/// use ferrous_wire::{GraphCache, InMemoryGraphCache};
///
/// let cache = InMemoryGraphCache::new();
/// cache.set("graph", "{}".to_string()).unwrap();
/// assert_eq!(cache.get("graph").as_deref(), Some("{}"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraphCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryGraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl GraphCache for InMemoryGraphCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, blob: String) -> DiResult<()> {
        self.entries.write().insert(key.to_string(), blob);
        Ok(())
    }
}

/// The blob format: resolved bindings plus the fingerprint of their inputs.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PersistedGraph {
    pub(crate) fingerprint: u64,
    pub(crate) bindings: Vec<Binding>,
}

impl PersistedGraph {
    pub(crate) fn encode(&self) -> DiResult<String> {
        serde_json::to_string(self).map_err(|e| DiError::Cache(e.to_string()))
    }

    pub(crate) fn decode(blob: &str) -> DiResult<Self> {
        serde_json::from_str(blob).map_err(|e| DiError::Cache(e.to_string()))
    }
}

/// Hash of everything resolution depends on: normalized definitions, alias
/// and interface maps, parameter names, container defaults and the shape of
/// every registered type.
pub(crate) fn fingerprint(registry: &Registry, types: &TypeRegistry, config: &ContainerConfig) -> DiResult<u64> {
    let mut hasher = DefaultHasher::new();
    env!("CARGO_PKG_VERSION").hash(&mut hasher);

    for (id, def) in registry.iter() {
        id.hash(&mut hasher);
        serde_json::to_string(def)
            .map_err(|e| DiError::Cache(e.to_string()))?
            .hash(&mut hasher);
    }

    let mut aliases: Vec<_> = registry.aliases().iter().collect();
    aliases.sort();
    aliases.hash(&mut hasher);
    let mut interfaces: Vec<_> = registry.interfaces().iter().collect();
    interfaces.sort();
    interfaces.hash(&mut hasher);

    // autowire only asks whether a parameter exists
    for name in registry.parameters().keys() {
        name.hash(&mut hasher);
    }

    serde_json::to_string(config)
        .map_err(|e| DiError::Cache(e.to_string()))?
        .hash(&mut hasher);

    let mut names = types.names();
    names.sort_unstable();
    for name in names {
        if let Some(descriptor) = types.get(name) {
            descriptor.hash_shape(&mut hasher);
        }
    }

    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ServiceDefinition;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.define("a", ServiceDefinition::class("A"));
        registry.set_parameter("p", 1);
        registry
    }

    #[test]
    fn fingerprint_is_stable_for_equal_inputs() {
        let types = TypeRegistry::new();
        let config = ContainerConfig::default();
        assert_eq!(
            fingerprint(&registry(), &types, &config).unwrap(),
            fingerprint(&registry(), &types, &config).unwrap()
        );
    }

    #[test]
    fn fingerprint_tracks_definitions_and_parameter_names() {
        let types = TypeRegistry::new();
        let config = ContainerConfig::default();
        let base = fingerprint(&registry(), &types, &config).unwrap();

        let mut changed = registry();
        changed.set_class("a", "B");
        assert_ne!(fingerprint(&changed, &types, &config).unwrap(), base);

        let mut value_only = registry();
        value_only.set_parameter("p", 2);
        assert_eq!(fingerprint(&value_only, &types, &config).unwrap(), base);

        let mut renamed = registry();
        renamed.set_parameter("q", 1);
        assert_ne!(fingerprint(&renamed, &types, &config).unwrap(), base);
    }

    #[test]
    fn fingerprint_tracks_type_signatures() {
        use crate::types::{ParamDescriptor, TypeDescriptor};

        let config = ContainerConfig::default();
        let shape = |descriptor: TypeDescriptor| {
            let mut types = TypeRegistry::new();
            types.register(descriptor);
            fingerprint(&registry(), &types, &config).unwrap()
        };
        let base = shape(TypeDescriptor::abstract_type("A"));

        assert_eq!(shape(TypeDescriptor::abstract_type("A")), base);
        assert_ne!(shape(TypeDescriptor::abstract_type("A").param(ParamDescriptor::string("x"))), base);
        assert_ne!(shape(TypeDescriptor::abstract_type("A").implements("I")), base);
        assert_ne!(
            shape(TypeDescriptor::abstract_type("A").param(ParamDescriptor::string("x").with_default(1))),
            shape(TypeDescriptor::abstract_type("A").param(ParamDescriptor::string("x").with_default(2)))
        );
    }

    #[test]
    fn garbage_blobs_are_cache_errors() {
        assert!(matches!(PersistedGraph::decode("not json"), Err(DiError::Cache(_))));
    }

    #[test]
    fn blobs_round_trip() {
        let graph = PersistedGraph { fingerprint: 7, bindings: vec![Binding::synthetic("x")] };
        let decoded = PersistedGraph::decode(&graph.encode().unwrap()).unwrap();
        assert_eq!(decoded.fingerprint, 7);
        assert_eq!(decoded.bindings, graph.bindings);
    }
}
