//! Type descriptors: the registry the resolver consults instead of reflection.
//!
//! A [`TypeDescriptor`] names a concrete type, lists the interfaces it
//! satisfies, describes its constructor and method signatures, and carries the
//! function that actually builds an instance from resolved arguments.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::traits::Service;
use crate::value::{Injected, Instance, Value};

/// Builds an instance from resolved constructor arguments.
pub type ConstructorFn = Arc<dyn Fn(Vec<Injected>) -> DiResult<Instance> + Send + Sync>;
/// A static (type-level) method, usable as a factory.
pub type StaticFn = Arc<dyn Fn(Vec<Injected>) -> DiResult<Injected> + Send + Sync>;
/// Computes a deferred property value from the owning instance.
pub type PropertyInitializer = Arc<dyn Fn(&dyn Service) -> DiResult<Injected> + Send + Sync>;

/// Builtin scalar kinds; parameters of these kinds are never autowired to services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Any,
}

/// Declared type of a constructor or method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    Primitive(Primitive),
    /// A service type or interface name
    Service(String),
}

/// One parameter of a constructor or method signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    pub name: String,
    pub kind: ParamType,
    /// Declared default, used when autowiring finds nothing better
    pub default: Option<Value>,
    /// Inject directive (`@id`, `%param%`, `$ENV$` or a literal) used by annotwire
    pub inject: Option<String>,
}

impl ParamDescriptor {
    pub fn primitive(name: impl Into<String>, kind: Primitive) -> Self {
        Self {
            name: name.into(),
            kind: ParamType::Primitive(kind),
            default: None,
            inject: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::primitive(name, Primitive::String)
    }

    /// A parameter typed by service type or interface name.
    pub fn service(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamType::Service(type_name.into()),
            default: None,
            inject: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn inject(mut self, directive: impl Into<String>) -> Self {
        self.inject = Some(directive.into());
        self
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ParamType::Primitive(_))
    }
}

fn hash_params<H: Hasher>(params: &[ParamDescriptor], state: &mut H) {
    params.len().hash(state);
    for param in params {
        param.name.hash(state);
        param.kind.hash(state);
        // Value holds floats, so the default is hashed through its rendering
        format!("{:?}", param.default).hash(state);
        param.inject.hash(state);
    }
}

/// Signature of a method, plus the function body for static methods.
#[derive(Clone, Default)]
pub struct MethodDescriptor {
    pub params: Vec<ParamDescriptor>,
    /// Declared return type, used to extend the graph through factories
    pub returns: Option<String>,
    pub(crate) function: Option<StaticFn>,
}

impl MethodDescriptor {
    /// An instance method; calls go through [`Service::invoke`].
    pub fn new(params: Vec<ParamDescriptor>) -> Self {
        Self {
            params,
            returns: None,
            function: None,
        }
    }

    /// A static method backed by `function`.
    pub fn static_fn<F>(params: Vec<ParamDescriptor>, function: F) -> Self
    where
        F: Fn(Vec<Injected>) -> DiResult<Injected> + Send + Sync + 'static,
    {
        Self {
            params,
            returns: None,
            function: Some(Arc::new(function)),
        }
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.returns = Some(type_name.into());
        self
    }

    pub fn is_static(&self) -> bool {
        self.function.is_some()
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("static", &self.is_static())
            .finish()
    }
}

/// Normalized description of a concrete (or abstract) type.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Arguments, DiResult, Injected, MethodDescriptor, ParamDescriptor, Service, TypeDescriptor};
/// use std::any::Any;
/// use std::sync::Arc;
///
/// struct MySQLAdapter { path: String }
///
/// impl Service for MySQLAdapter {
///     fn type_name(&self) -> &str { "MySQLAdapter" }
///     fn as_any(&self) -> &dyn Any { self }
/// }
///
/// let adapter = TypeDescriptor::new("MySQLAdapter", |args| {
///         Ok(Arc::new(MySQLAdapter { path: args.string(0)? }))
///     })
///     .implements("DatabaseAdapter")
///     .param(ParamDescriptor::string("path"))
///     .method("connect", MethodDescriptor::new(vec![]));
///
/// assert!(adapter.satisfies("DatabaseAdapter"));
/// assert!(adapter.method_descriptor("connect").is_some());
/// ```
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    implements: Vec<String>,
    params: Vec<ParamDescriptor>,
    methods: HashMap<String, MethodDescriptor>,
    lazy_properties: HashMap<String, PropertyInitializer>,
    injected_properties: Vec<(String, String)>,
    constructor: Option<ConstructorFn>,
}

impl TypeDescriptor {
    /// A constructible type.
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(Vec<Injected>) -> DiResult<Instance> + Send + Sync + 'static,
    {
        Self {
            constructor: Some(Arc::new(constructor)),
            ..Self::abstract_type(name)
        }
    }

    /// A type that cannot be constructed directly (interfaces, factory holders).
    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implements: Vec::new(),
            params: Vec::new(),
            methods: HashMap::new(),
            lazy_properties: HashMap::new(),
            injected_properties: Vec::new(),
            constructor: None,
        }
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    /// Appends a constructor parameter.
    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: MethodDescriptor) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    /// Declares a property whose value is computed on first read through a
    /// property proxy.
    pub fn lazy_property<F>(mut self, name: impl Into<String>, initializer: F) -> Self
    where
        F: Fn(&dyn Service) -> DiResult<Injected> + Send + Sync + 'static,
    {
        self.lazy_properties.insert(name.into(), Arc::new(initializer));
        self
    }

    /// Declares an annotwired property: after construction it is assigned
    /// from `directive` through [`Service::set_property`].
    pub fn inject_property(mut self, name: impl Into<String>, directive: impl Into<String>) -> Self {
        self.injected_properties.push((name.into(), directive.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feeds everything resolution reads from this type into `state`:
    /// interfaces, constructor and method signatures, return types and
    /// declared properties. Function bodies are not part of the shape.
    pub(crate) fn hash_shape<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.implements.hash(state);
        self.constructor.is_some().hash(state);
        hash_params(&self.params, state);

        let mut methods: Vec<_> = self.methods.iter().collect();
        methods.sort_by(|a, b| a.0.cmp(b.0));
        for (name, method) in methods {
            name.hash(state);
            hash_params(&method.params, state);
            method.returns.hash(state);
            method.is_static().hash(state);
        }

        let mut lazy: Vec<_> = self.lazy_properties.keys().collect();
        lazy.sort();
        lazy.hash(state);
        self.injected_properties.hash(state);
    }

    pub fn interfaces(&self) -> &[String] {
        &self.implements
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn method_descriptor(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn property_initializer(&self, name: &str) -> Option<&PropertyInitializer> {
        self.lazy_properties.get(name)
    }

    pub fn injected_properties(&self) -> &[(String, String)] {
        &self.injected_properties
    }

    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }

    /// True when this type is `type_name` or declares it as an interface.
    pub fn satisfies(&self, type_name: &str) -> bool {
        self.name == type_name || self.implements.iter().any(|i| i == type_name)
    }

    pub(crate) fn construct(&self, args: Vec<Injected>) -> DiResult<Instance> {
        match &self.constructor {
            Some(ctor) => ctor(args),
            None => Err(DiError::construction(
                self.name.clone(),
                "type is abstract and has no constructor",
            )),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lazy: Vec<&String> = self.lazy_properties.keys().collect();
        lazy.sort();
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("implements", &self.implements)
            .field("params", &self.params)
            .field("methods", &self.methods)
            .field("lazy_properties", &lazy)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// Lookup table from type name to descriptor.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a descriptor.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// True when `concrete` is `wanted` or declares it as an interface.
    pub fn satisfies(&self, concrete: &str, wanted: &str) -> bool {
        concrete == wanted
            || self
                .types
                .get(concrete)
                .map(|d| d.satisfies(wanted))
                .unwrap_or(false)
    }

    /// Registered type names, in no particular order.
    pub fn names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
