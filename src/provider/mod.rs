//! The built container: resolves services from the binding graph.
//!
//! [`Container`] is the runtime half of the crate. It canonicalizes the
//! requested id, applies the visibility and scope rules, builds or fetches
//! the instance and finally runs the middleware pipeline over it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::binding::Binding;
use crate::config::{ContainerConfig, Environment};
use crate::error::{DiError, DiResult};
use crate::internal::cycle_chains;
use crate::lifetime::{Scope, Visibility};
use crate::middleware::MiddlewarePipeline;
use crate::observer::Observers;
use crate::registration::resolve_alias;
use crate::types::TypeRegistry;
use crate::value::{Instance, Value};

pub(crate) mod context;
mod instantiate;
pub(crate) mod scope;

use context::ResolutionContext;
use scope::ScopeManager;

/// Service container built by [`ContainerBuilder::build`](crate::ContainerBuilder::build).
///
/// Cloning is cheap; clones share the caches and the parameter table.
///
/// # Thread Safety
///
/// `Container` is `Send + Sync`. Concurrent first requests for the same
/// cached service run exactly one construction and all callers receive the
/// same instance; unrelated ids resolve independently.
///
/// # Examples
///
/// ```
/// use ferrous_wire::{Arguments, ContainerBuilder, Service, TypeDescriptor, ParamDescriptor};
/// use std::any::Any;
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// impl Service for Database {
///     fn type_name(&self) -> &str { "Database" }
///     fn as_any(&self) -> &dyn Any { self }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_type(
///     TypeDescriptor::new("Database", |args| Ok(Arc::new(Database { url: args.string(0)? })))
///         .param(ParamDescriptor::string("url")),
/// );
/// builder.set_class("db", "Database").add_argument("db", "%db.url%");
/// builder.set_parameter("db.url", "postgres://localhost");
///
/// let container = builder.build().unwrap();
/// let db = container.get("db").unwrap();
/// assert_eq!(db.downcast_ref::<Database>().unwrap().url, "postgres://localhost");
/// assert!(Arc::ptr_eq(&db, &container.get("db").unwrap()));
/// ```
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) bindings: RwLock<HashMap<String, Arc<Binding>>>,
    pub(crate) order: RwLock<Vec<String>>,
    pub(crate) aliases: HashMap<String, String>,
    pub(crate) interfaces: HashMap<String, String>,
    pub(crate) parameters: RwLock<BTreeMap<String, Value>>,
    pub(crate) environment: Environment,
    pub(crate) types: TypeRegistry,
    /// Cycle chains left in the graph under the lenient cycle policy
    pub(crate) cycles: RwLock<HashMap<String, Vec<String>>>,
    pub(crate) scopes: ScopeManager,
    pub(crate) middleware: MiddlewarePipeline,
    pub(crate) observers: Observers,
    pub(crate) config: ContainerConfig,
}

impl Container {
    pub(crate) fn from_inner(inner: ContainerInner) -> Self {
        Self { inner: Arc::new(inner) }
    }

    /// Resolves `id` with visibility enforced.
    ///
    /// `id` may be a service id, an alias or an interface name.
    pub fn get(&self, id: &str) -> DiResult<Instance> {
        self.get_with(id, true)
    }

    /// Resolves `id` as an external caller. With `enforce_visibility` off,
    /// services with private visibility are handed out too; private-scoped
    /// services never are.
    pub fn get_with(&self, id: &str, enforce_visibility: bool) -> DiResult<Instance> {
        let mut ctx = ResolutionContext::new();
        self.resolve(id, &mut ctx, false, enforce_visibility)
    }

    /// Resolves `id` as if another service depended on it.
    pub(crate) fn get_as_dependency(&self, id: &str) -> DiResult<Instance> {
        let mut ctx = ResolutionContext::new();
        self.resolve(id, &mut ctx, true, false)
    }

    pub(crate) fn resolve(
        &self,
        name: &str,
        ctx: &mut ResolutionContext,
        via_dependency: bool,
        enforce_visibility: bool,
    ) -> DiResult<Instance> {
        let observers = &self.inner.observers;
        if !observers.has_observers() {
            return self.resolve_id(name, ctx, via_dependency, enforce_visibility);
        }
        observers.resolving(name);
        let start = Instant::now();
        match self.resolve_id(name, ctx, via_dependency, enforce_visibility) {
            Ok(instance) => {
                observers.resolved(name, start.elapsed());
                Ok(instance)
            }
            Err(error) => {
                observers.failed(name, &error);
                Err(error)
            }
        }
    }

    fn resolve_id(
        &self,
        name: &str,
        ctx: &mut ResolutionContext,
        via_dependency: bool,
        enforce_visibility: bool,
    ) -> DiResult<Instance> {
        let id = self.canonical_id(name);
        let binding = self
            .binding(&id)
            .ok_or_else(|| DiError::ServiceNotFound(name.to_string()))?;

        // private-scoped services look absent from outside
        if binding.scope == Scope::Private && !via_dependency {
            return Err(DiError::ServiceNotFound(name.to_string()));
        }
        if binding.scope == Scope::Proxy {
            return Err(DiError::NotImplemented(format!("proxy scope ('{}')", id)));
        }
        if !binding.lazy.is_lazy()
            && enforce_visibility
            && !via_dependency
            && binding.visibility == Visibility::Private
        {
            return Err(DiError::AccessDenied(id));
        }

        // refused before any slot is taken: two threads entering one cycle
        // from opposite ends would otherwise wait on each other's slot
        if ctx.is_idle() && !binding.lazy.is_lazy() {
            self.check_cycle_free(&id)?;
        }

        let instance = ctx.guarded(&id, |ctx| {
            self.inner.scopes.get_or_create(&binding, || {
                if binding.lazy.is_lazy() {
                    self.make_proxy(&binding)
                } else {
                    self.instantiate(&binding, ctx)
                }
            })
        })?;
        if self.inner.middleware.is_empty() {
            return Ok(instance);
        }
        self.inner.middleware.apply(instance, &id)
    }

    pub(crate) fn check_cycle_free(&self, id: &str) -> DiResult<()> {
        match self.inner.cycles.read().get(id) {
            Some(chain) => Err(DiError::CircularDependency(chain.clone())),
            None => Ok(()),
        }
    }

    fn canonical_id(&self, name: &str) -> String {
        if self.inner.bindings.read().contains_key(name) {
            return name.to_string();
        }
        resolve_alias(&self.inner.aliases, &self.inner.interfaces, name).to_string()
    }

    /// True if `id` (or the alias/interface it names) is bound.
    pub fn has(&self, id: &str) -> bool {
        let id = self.canonical_id(id);
        self.inner.bindings.read().contains_key(&id)
    }

    /// The resolved binding behind `id`.
    pub fn binding(&self, id: &str) -> Option<Arc<Binding>> {
        let id = self.canonical_id(id);
        self.inner.bindings.read().get(&id).cloned()
    }

    /// Bound ids in registration order.
    pub fn service_ids(&self) -> Vec<String> {
        self.inner.order.read().clone()
    }

    pub(crate) fn bindings_in_order(&self) -> Vec<Arc<Binding>> {
        let bindings = self.inner.bindings.read();
        self.inner
            .order
            .read()
            .iter()
            .filter_map(|id| bindings.get(id).cloned())
            .collect()
    }

    /// Registers a pre-built singleton, replacing any binding under `id`.
    pub fn set(&self, id: &str, instance: Instance) {
        let id = self.canonical_id(id);
        {
            let mut bindings = self.inner.bindings.write();
            if bindings
                .insert(id.clone(), Arc::new(Binding::synthetic(&id)))
                .is_none()
            {
                self.inner.order.write().push(id.clone());
            }
            let mut cycles = self.inner.cycles.write();
            if !cycles.is_empty() {
                *cycles = cycle_chains(&bindings, &self.inner.order.read());
            }
        }
        self.inner.scopes.insert_singleton(&id, instance);
        debug!(service = %id, "instance set");
    }

    /// Looks up a parameter.
    pub fn get_parameter(&self, name: &str) -> DiResult<Value> {
        self.inner
            .parameters
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DiError::ParameterNotFound(name.to_string()))
    }

    /// Sets a parameter. Later `%name%` references see the new value;
    /// already built instances are not rebuilt.
    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.parameters.write().insert(name.into(), value.into());
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.inner.parameters.read().contains_key(name)
    }

    /// Ids carrying `tag`, in registration order. Private-scoped services
    /// are not listed.
    pub fn find_tagged_service_ids(&self, tag: &str) -> Vec<String> {
        self.tagged(tag).map(|b| b.id.clone()).collect()
    }

    fn tagged(&self, tag: &str) -> impl Iterator<Item = Arc<Binding>> + '_ {
        let tag = tag.to_string();
        self.bindings_in_order()
            .into_iter()
            .filter(move |b| b.scope != Scope::Private && b.tags.iter().any(|t| *t == tag))
    }

    pub fn service_tags(&self, id: &str) -> Vec<String> {
        self.binding(id).map(|b| b.tags.clone()).unwrap_or_default()
    }

    /// Resolves every externally reachable service carrying `tag`.
    /// Services hidden by private visibility are skipped.
    pub fn get_by_tag(&self, tag: &str) -> DiResult<Vec<(String, Instance)>> {
        self.tagged(tag)
            .filter(|b| b.lazy.is_lazy() || b.visibility != Visibility::Private)
            .map(|b| {
                let instance = self.get(&b.id)?;
                Ok((b.id.clone(), instance))
            })
            .collect()
    }

    /// Ends the current request: drops request-scoped instances after running
    /// their cleanup hooks, newest first. Returns the cleaned ids.
    pub fn end_request(&self) -> Vec<String> {
        let cleaned = self.inner.scopes.end_request();
        debug!(count = cleaned.len(), "request ended");
        cleaned
    }

    /// Runs cleanup on every cached instance, request scope first, each in
    /// reverse construction order, and empties the caches.
    pub fn shutdown(&self) -> Vec<String> {
        let cleaned = self.inner.scopes.shutdown();
        info!(count = cleaned.len(), "container shut down");
        cleaned
    }

    /// Number of instantiated singletons.
    pub fn singleton_count(&self) -> usize {
        self.inner.scopes.singleton_count()
    }

    /// True once `id` holds a cached instance (for lazy services, the proxy).
    pub fn is_instantiated(&self, id: &str) -> bool {
        let id = self.canonical_id(id);
        self.inner.scopes.cached(&id).is_some()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Container ===\n");
        s.push_str("Bindings:\n");
        for binding in self.bindings_in_order() {
            s.push_str(&format!(
                "  {}: {:?} scope={} lazy={:?} deps={:?}\n",
                binding.id,
                binding.constructor,
                binding.scope.as_str(),
                binding.lazy,
                binding.dependencies().collect::<Vec<_>>()
            ));
        }
        let mut aliases: Vec<_> = self.inner.aliases.iter().collect();
        aliases.sort();
        s.push_str("Aliases:\n");
        for (alias, id) in aliases {
            s.push_str(&format!("  {} -> {}\n", alias, id));
        }
        s
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        let live = self.scopes.singleton_count() + self.scopes.request_count();
        if live > 0 {
            debug!(live, "container dropped without shutdown(); cleanup hooks were not run");
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.inner.order.read().len())
            .field("singletons", &self.inner.scopes.singleton_count())
            .finish()
    }
}
