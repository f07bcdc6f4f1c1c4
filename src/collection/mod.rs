//! Container builder: collects definitions, types, middleware and hooks,
//! then builds a [`Container`].
//!
//! The builder mirrors the [`Registry`] mutators so definitions can be
//! written fluently; everything else (types, pre-built instances,
//! middleware, observers, compiler passes, configuration) only exists here.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::binding::Binding;
use crate::cache::{self, GraphCache, PersistedGraph};
use crate::config::{ContainerConfig, CyclePolicy, Environment};
use crate::definition::{DefinitionSet, ServiceDefinition};
use crate::error::DiResult;
use crate::internal::{check_references, cycle_chains, find_cycles, reject_cycles};
use crate::lifetime::{LazyStrategy, Scope, Visibility, WiringMode};
use crate::middleware::{FnMiddleware, Middleware, MiddlewarePipeline, Next};
use crate::observer::{ContainerObserver, Observers};
use crate::prewarm::{is_preloadable, PrewarmSet};
use crate::provider::scope::ScopeManager;
use crate::provider::{Container, ContainerInner};
use crate::registration::Registry;
use crate::resolver::DependencyResolver;
use crate::traits::CompilerPass;
use crate::types::{TypeDescriptor, TypeRegistry};
use crate::value::{Instance, Value};

/// Builder for a [`Container`].
///
/// # Examples
///
/// ```
/// use ferrous_wire::{ContainerBuilder, Scope, Service, TypeDescriptor};
/// use std::any::Any;
/// use std::sync::Arc;
///
/// struct Clock;
/// impl Service for Clock {
///     fn type_name(&self) -> &str { "Clock" }
///     fn as_any(&self) -> &dyn Any { self }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_type(TypeDescriptor::new("Clock", |_| Ok(Arc::new(Clock))));
/// builder
///     .set_class("clock", "Clock")
///     .set_scope("clock", Scope::Prototype)
///     .set_alias("time", "clock");
///
/// let container = builder.build().unwrap();
/// let a = container.get("time").unwrap();
/// let b = container.get("clock").unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// ```
pub struct ContainerBuilder {
    registry: Registry,
    types: TypeRegistry,
    instances: Vec<(String, Instance)>,
    middleware: Vec<Arc<dyn Middleware>>,
    service_middleware: Vec<(String, Arc<dyn Middleware>)>,
    observers: Observers,
    passes: Vec<Box<dyn CompilerPass>>,
    config: ContainerConfig,
    environment: Environment,
    graph_cache: Option<Arc<dyn GraphCache>>,
    prewarm: PrewarmSet,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            types: TypeRegistry::new(),
            instances: Vec::new(),
            middleware: Vec::new(),
            service_middleware: Vec::new(),
            observers: Observers::new(),
            passes: Vec::new(),
            config: ContainerConfig::default(),
            environment: Environment::new(),
            graph_cache: None,
            prewarm: PrewarmSet::new(),
        }
    }

    // ----- Configuration -----

    pub fn with_config(&mut self, config: ContainerConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Environment table consulted for `$NAME$` references.
    pub fn with_environment(&mut self, environment: Environment) -> &mut Self {
        self.environment = environment;
        self
    }

    /// Reuses a resolved graph from `cache` when the definitions are unchanged,
    /// and stores freshly resolved graphs there.
    pub fn with_graph_cache(&mut self, cache: Arc<dyn GraphCache>) -> &mut Self {
        self.graph_cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Loads a definition document: parameters, then services in document
    /// order. Document defaults override the current configuration.
    ///
    /// ```
    /// use ferrous_wire::{ContainerBuilder, DefinitionSet, WiringMode};
    ///
    /// let set: DefinitionSet = serde_json::from_str(r#"{
    ///     "defaults": { "public": false, "autowire": true },
    ///     "services": { "logger": "FileLogger" }
    /// }"#).unwrap();
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.load_definitions(set);
    /// assert!(builder.registry().has("logger"));
    /// assert!(!builder.config().public_by_default);
    /// assert_eq!(builder.config().default_wiring, WiringMode::Autowire);
    /// ```
    pub fn load_definitions(&mut self, set: DefinitionSet) -> &mut Self {
        let DefinitionSet { parameters, defaults, services } = set;
        if let Some(public) = defaults.public {
            self.config.public_by_default = public;
        }
        match (defaults.autowire, defaults.annotwire) {
            (Some(true), _) => self.config.default_wiring = WiringMode::Autowire,
            (_, Some(true)) => self.config.default_wiring = WiringMode::Annotwire,
            (Some(false), _) | (_, Some(false)) => self.config.default_wiring = WiringMode::Explicit,
            _ => {}
        }
        for (name, value) in parameters {
            self.registry.set_parameter(name, value);
        }
        let count = services.len();
        for (id, definition) in services {
            self.registry.define(id, definition);
        }
        debug!(services = count, "definitions loaded");
        self
    }

    // ----- Types and instances -----

    /// Registers the descriptor that stands in for reflection on `class`.
    pub fn register_type(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types.register(descriptor);
        self
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Registers a pre-built singleton under `id`, replacing any definition.
    pub fn set_instance(&mut self, id: impl Into<String>, instance: Instance) -> &mut Self {
        let id = id.into();
        self.registry.remove(&id);
        self.instances.retain(|(existing, _)| existing != &id);
        self.instances.push((id, instance));
        self
    }

    // ----- Definitions (see `Registry`) -----

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn define(&mut self, id: impl Into<String>, definition: ServiceDefinition) -> &mut Self {
        self.registry.define(id, definition);
        self
    }

    /// Defines `id` only if it is not defined yet; returns whether it was added.
    pub fn bind_if(&mut self, id: impl Into<String>, definition: ServiceDefinition) -> bool {
        self.registry.bind_if(id, definition)
    }

    pub fn set_class(&mut self, id: &str, class: impl Into<String>) -> &mut Self {
        self.registry.set_class(id, class);
        self
    }

    /// `target` is a type name (static factory) or `@service`.
    pub fn set_factory(&mut self, id: &str, target: impl Into<String>, method: impl Into<String>) -> &mut Self {
        self.registry.set_factory(id, target, method);
        self
    }

    pub fn add_argument(&mut self, id: &str, argument: impl Into<Value>) -> &mut Self {
        self.registry.add_argument(id, argument);
        self
    }

    pub fn set_arguments<I, V>(&mut self, id: &str, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.registry.set_arguments(id, arguments);
        self
    }

    pub fn add_method_call<I, V>(&mut self, id: &str, method: impl Into<String>, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.registry.add_method_call(id, method, arguments);
        self
    }

    pub fn set_scope(&mut self, id: &str, scope: Scope) -> &mut Self {
        self.registry.set_scope(id, scope);
        self
    }

    pub fn set_visibility(&mut self, id: &str, visibility: Visibility) -> &mut Self {
        self.registry.set_visibility(id, visibility);
        self
    }

    pub fn set_shared(&mut self, id: &str, shared: bool) -> &mut Self {
        self.registry.set_shared(id, shared);
        self
    }

    pub fn set_lazy(&mut self, id: &str, lazy: LazyStrategy) -> &mut Self {
        self.registry.set_lazy(id, lazy);
        self
    }

    pub fn set_lazy_method(&mut self, id: &str, method: impl Into<String>) -> &mut Self {
        self.registry.set_lazy_method(id, method);
        self
    }

    pub fn set_lazy_properties<I, S>(&mut self, id: &str, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.set_lazy_properties(id, properties);
        self
    }

    pub fn extends(&mut self, id: &str, parent: impl Into<String>) -> &mut Self {
        self.registry.extends(id, parent);
        self
    }

    pub fn autowire(&mut self, id: &str) -> &mut Self {
        self.registry.autowire(id);
        self
    }

    pub fn annotwire(&mut self, id: &str) -> &mut Self {
        self.registry.annotwire(id);
        self
    }

    pub fn inject(&mut self, id: &str, parameter: impl Into<String>, directive: impl Into<String>) -> &mut Self {
        self.registry.inject(id, parameter, directive);
        self
    }

    pub fn add_tag<I, S>(&mut self, id: &str, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.add_tag(id, tags);
        self
    }

    pub fn implements(&mut self, id: &str, interface: impl Into<String>) -> &mut Self {
        self.registry.implements(id, interface);
        self
    }

    pub fn set_alias(&mut self, alias: impl Into<String>, id: &str) -> &mut Self {
        self.registry.set_alias(alias, id);
        self
    }

    /// Wraps `id` in `decorator_class`; the decorated definition moves to
    /// `inner_id`, or `<id>.inner` when none is given.
    pub fn decorate(&mut self, id: &str, decorator_class: impl Into<String>, inner_id: Option<&str>) -> &mut Self {
        self.registry.decorate(id, decorator_class, inner_id);
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.registry.set_parameter(name, value);
        self
    }

    // ----- Middleware and observers -----

    /// Adds middleware that runs for every service, in registration order.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Closure form of [`add_middleware`](Self::add_middleware).
    ///
    /// ```
    /// use ferrous_wire::ContainerBuilder;
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.add_middleware_fn(|instance, id, next| {
    ///     println!("resolved {}", id);
    ///     next.run(instance)
    /// });
    /// ```
    pub fn add_middleware_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Instance, &str, Next<'_>) -> DiResult<Instance> + Send + Sync + 'static,
    {
        self.add_middleware(Arc::new(FnMiddleware(f)))
    }

    /// Adds middleware for one service; it runs after all global middleware.
    pub fn add_service_middleware(&mut self, id: impl Into<String>, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.service_middleware.push((id.into(), middleware));
        self
    }

    pub fn add_service_middleware_fn<F>(&mut self, id: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Instance, &str, Next<'_>) -> DiResult<Instance> + Send + Sync + 'static,
    {
        self.add_service_middleware(id, Arc::new(FnMiddleware(f)))
    }

    /// Adds an observer that is notified of every resolution.
    ///
    /// Observer calls are made synchronously during resolution. Keep observer
    /// implementations lightweight.
    pub fn add_observer(&mut self, observer: Arc<dyn ContainerObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    // ----- Compilation -----

    /// Queues a pass; passes run highest priority first, ties in
    /// registration order.
    pub fn add_compiler_pass<P: CompilerPass + 'static>(&mut self, pass: P) -> &mut Self {
        self.passes.push(Box::new(pass));
        self.passes.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        self
    }

    /// Runs and drains the queued compiler passes.
    pub fn compile(&mut self) -> DiResult<&mut Self> {
        let passes = std::mem::take(&mut self.passes);
        for pass in &passes {
            pass.process(&mut self.registry)?;
        }
        if !passes.is_empty() {
            debug!(passes = passes.len(), "compiler passes applied");
        }
        Ok(self)
    }

    /// Marks `id` to be built during [`build`](Self::build).
    pub fn prewarm(&mut self, id: impl Into<String>) -> &mut Self {
        self.prewarm.add(id);
        self
    }

    // ----- Build -----

    /// Builds the container.
    ///
    /// Runs compiler passes, normalizes the registry (`extends`, decorators,
    /// aliases), resolves every definition into a binding, checks that every
    /// service reference exists and applies the cycle policy. Prewarmed
    /// services, and all singletons when preloading is enabled, are built
    /// before this returns; the first failure among them fails the build.
    pub fn build(mut self) -> DiResult<Container> {
        self.compile()?;
        self.registry.normalize()?;
        self.registry.check_aliases()?;

        let resolved = self.resolve_bindings()?;
        let mut order = Vec::with_capacity(resolved.len() + self.instances.len());
        let mut bindings = HashMap::with_capacity(order.capacity());
        for binding in resolved {
            order.push(binding.id.clone());
            bindings.insert(binding.id.clone(), binding);
        }
        for (id, _) in &self.instances {
            if bindings.insert(id.clone(), Binding::synthetic(id)).is_none() {
                order.push(id.clone());
            }
        }

        check_references(&bindings, &order, |_| false)?;
        let mut cycles = HashMap::new();
        match self.config.cycle_policy {
            CyclePolicy::RejectGraph => reject_cycles(&bindings, &order)?,
            CyclePolicy::FailOnResolve => {
                let found = find_cycles(&bindings, &order);
                for chain in &found {
                    warn!(chain = %chain.join(" -> "), "circular dependency left in graph");
                }
                if !found.is_empty() {
                    cycles = cycle_chains(&bindings, &order);
                }
            }
        }

        // per-service middleware may be registered under an alias or interface
        let mut service_middleware: HashMap<String, Vec<Arc<dyn Middleware>>> = HashMap::new();
        for (name, layer) in std::mem::take(&mut self.service_middleware) {
            let id = if bindings.contains_key(&name) {
                name
            } else {
                self.registry.resolve_id(&name).to_string()
            };
            service_middleware.entry(id).or_default().push(layer);
        }

        let mut preload: Vec<String> = if self.config.preload_singletons {
            order
                .iter()
                .filter(|id| bindings.get(*id).map(is_preloadable).unwrap_or(false))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        for id in self.prewarm.ids() {
            if !preload.contains(id) {
                preload.push(id.clone());
            }
        }

        let services = order.len();
        let inner = ContainerInner {
            bindings: RwLock::new(bindings.into_iter().map(|(id, b)| (id, Arc::new(b))).collect()),
            order: RwLock::new(order),
            aliases: self.registry.aliases().clone(),
            interfaces: self.registry.interfaces().clone(),
            parameters: RwLock::new(self.registry.parameters().clone()),
            environment: self.environment,
            types: self.types,
            cycles: RwLock::new(cycles),
            scopes: ScopeManager::new(),
            middleware: MiddlewarePipeline::new(self.middleware, service_middleware),
            observers: self.observers,
            config: self.config,
        };
        let container = Container::from_inner(inner);
        for (id, instance) in self.instances {
            container.inner.scopes.insert_singleton(&id, instance);
        }

        if !preload.is_empty() {
            let report = container.preload(&preload);
            if let Some(error) = report.first_error() {
                return Err(error.clone());
            }
        }

        info!(
            services,
            aliases = container.inner.aliases.len(),
            parameters = container.inner.parameters.read().len(),
            "container built"
        );
        Ok(container)
    }

    fn resolve_bindings(&self) -> DiResult<Vec<Binding>> {
        let resolve = || DependencyResolver::new(&self.registry, &self.types, &self.config).resolve_all();
        let Some(graph_cache) = &self.graph_cache else {
            return resolve();
        };

        let key = self.config.graph_cache_key.as_str();
        let fingerprint = cache::fingerprint(&self.registry, &self.types, &self.config)?;
        if let Some(blob) = graph_cache.get(key) {
            let graph = PersistedGraph::decode(&blob)?;
            if graph.fingerprint == fingerprint {
                debug!(key, bindings = graph.bindings.len(), "reusing cached graph");
                return Ok(graph.bindings);
            }
            debug!(key, "cached graph is stale");
        }

        let bindings = resolve()?;
        let graph = PersistedGraph { fingerprint, bindings };
        graph_cache.set(key, graph.encode()?)?;
        Ok(graph.bindings)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
