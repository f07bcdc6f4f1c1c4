//! Dependency resolver: turns normalized definitions into [`Binding`]s.
//!
//! Resolution is a pure function of the registry, the type registry and the
//! container defaults. Concrete types are computed once up front so that
//! factory outputs can take part in autowiring.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::binding::{ArgumentSpec, Binding, ConstructorBinding, MethodCallBinding};
use crate::config::ContainerConfig;
use crate::definition::ServiceDefinition;
use crate::error::{DiError, DiResult};
use crate::lifetime::{LazyStrategy, Visibility, WiringMode};
use crate::registration::Registry;
use crate::types::{ParamDescriptor, ParamType, TypeDescriptor, TypeRegistry};

pub(crate) struct DependencyResolver<'a> {
    registry: &'a Registry,
    types: &'a TypeRegistry,
    default_wiring: WiringMode,
    public_by_default: bool,
    concrete: HashMap<String, Option<String>>,
}

impl<'a> DependencyResolver<'a> {
    pub(crate) fn new(registry: &'a Registry, types: &'a TypeRegistry, config: &ContainerConfig) -> Self {
        let mut resolver = Self {
            registry,
            types,
            default_wiring: config.default_wiring,
            public_by_default: config.public_by_default,
            concrete: HashMap::new(),
        };
        let mut visiting = HashSet::new();
        for (id, _) in registry.iter() {
            resolver.concrete_type_of(id, &mut visiting);
        }
        resolver
    }

    /// Resolves every definition, in registration order.
    pub(crate) fn resolve_all(&self) -> DiResult<Vec<Binding>> {
        self.registry
            .iter()
            .map(|(id, def)| self.resolve(id, def))
            .collect()
    }

    /// Best-effort concrete type of a service: its class, or its factory's
    /// declared return type.
    fn concrete_type_of(&mut self, id: &str, visiting: &mut HashSet<String>) -> Option<String> {
        if let Some(known) = self.concrete.get(id) {
            return known.clone();
        }
        let registry = self.registry;
        let def = registry.definition(id)?;
        if !visiting.insert(id.to_string()) {
            return None;
        }

        let concrete = match &def.factory {
            Some(factory) => {
                let holder = match factory.service_target() {
                    Some(service) => {
                        let service = registry.resolve_id(service).to_string();
                        self.concrete_type_of(&service, visiting)
                    }
                    None => Some(factory.target.clone()),
                };
                let returns = holder
                    .as_deref()
                    .and_then(|t| self.types.get(t))
                    .and_then(|d| d.method_descriptor(&factory.method))
                    .and_then(|m| m.returns.clone());
                match returns.or_else(|| def.class.clone()) {
                    Some(output) => Some(output),
                    None => {
                        debug!(service = %id, factory = %factory.target, method = %factory.method,
                            "factory output type undetermined");
                        None
                    }
                }
            }
            None => def.class.clone(),
        };

        visiting.remove(id);
        self.concrete.insert(id.to_string(), concrete.clone());
        concrete
    }

    fn descriptor_of(&self, id: &str) -> Option<&'a TypeDescriptor> {
        let types = self.types;
        self.concrete
            .get(id)
            .and_then(|c| c.as_deref())
            .and_then(|name| types.get(name))
            .map(|d| d.as_ref())
    }

    /// First service (other than `requester`) whose id, alias, interface
    /// mapping, concrete type or declared interfaces match `type_name`.
    pub(crate) fn find_service_by_type(&self, type_name: &str, requester: &str) -> Option<String> {
        let mapped = self.registry.resolve_id(type_name);
        if mapped != requester && self.registry.has(mapped) {
            return Some(mapped.to_string());
        }
        self.registry
            .iter()
            .filter(|(id, _)| *id != requester)
            .find(|(id, def)| {
                let by_type = self
                    .concrete
                    .get(*id)
                    .and_then(|c| c.as_deref())
                    .map(|c| self.types.satisfies(c, type_name))
                    .unwrap_or(false);
                by_type || def.implements.iter().any(|i| i == type_name)
            })
            .map(|(id, _)| id.to_string())
    }

    pub(crate) fn resolve(&self, id: &str, def: &ServiceDefinition) -> DiResult<Binding> {
        let wiring = Registry::wiring_of(def, self.default_wiring);
        let (constructor, signature) = self.constructor_of(id, def)?;

        let arguments = if !def.arguments.is_empty() {
            def.arguments.iter().map(|raw| self.canonical(ArgumentSpec::parse(raw))).collect()
        } else {
            self.wire_params(id, def, wiring, signature)?
        };

        let descriptor = self.descriptor_of(id);
        let mut method_calls = Vec::with_capacity(def.method_calls.len());
        for call in &def.method_calls {
            let arguments = if !call.arguments.is_empty() || wiring == WiringMode::Explicit {
                call.arguments.iter().map(|raw| self.canonical(ArgumentSpec::parse(raw))).collect()
            } else {
                let params = descriptor
                    .and_then(|d| d.method_descriptor(&call.method))
                    .map(|m| m.params.as_slice())
                    .unwrap_or(&[]);
                self.wire_params(id, def, wiring, params)?
            };
            method_calls.push(MethodCallBinding {
                method: call.method.clone(),
                arguments,
            });
        }

        let property_injections = match (wiring, descriptor) {
            (WiringMode::Annotwire, Some(d)) => d
                .injected_properties()
                .iter()
                .map(|(name, directive)| (name.clone(), self.canonical(ArgumentSpec::parse_directive(directive))))
                .collect(),
            _ => Vec::new(),
        };

        let lazy = def.lazy.unwrap_or_default();
        if lazy == LazyStrategy::Method && def.lazy_method.is_none() {
            return Err(DiError::invalid(id, "method proxy requires `lazy_method`"));
        }
        if lazy == LazyStrategy::Property {
            if let Some(missing) = descriptor.and_then(|d| {
                def.lazy_properties
                    .iter()
                    .find(|p| d.property_initializer(p).is_none())
            }) {
                return Err(DiError::invalid(
                    id,
                    format!("lazy property `{}` has no initializer", missing),
                ));
            }
        }

        Ok(Binding {
            id: id.to_string(),
            constructor,
            concrete_type: self.concrete.get(id).cloned().flatten(),
            arguments,
            method_calls,
            property_injections,
            scope: def.scope.unwrap_or_default(),
            visibility: def.visibility.unwrap_or(if self.public_by_default {
                Visibility::Global
            } else {
                Visibility::Private
            }),
            shared: def.shared.unwrap_or(true),
            lazy,
            lazy_method: def.lazy_method.clone(),
            lazy_properties: def.lazy_properties.clone(),
            tags: def.tags.clone(),
            implements: def.implements.clone(),
        })
    }

    /// The constructor binding plus the parameter signature it consumes.
    fn constructor_of(&self, id: &str, def: &ServiceDefinition) -> DiResult<(ConstructorBinding, &'a [ParamDescriptor])> {
        if let Some(factory) = &def.factory {
            if let Some(service) = factory.service_target() {
                let service = self.registry.resolve_id(service).to_string();
                let signature = self
                    .descriptor_of(&service)
                    .and_then(|d| d.method_descriptor(&factory.method))
                    .map(|m| m.params.as_slice())
                    .unwrap_or(&[]);
                return Ok((
                    ConstructorBinding::ServiceFactory {
                        service,
                        method: factory.method.clone(),
                    },
                    signature,
                ));
            }

            let holder = self.types.get(&factory.target).ok_or_else(|| {
                DiError::invalid(id, format!("factory type '{}' is not registered", factory.target))
            })?;
            let method = holder
                .method_descriptor(&factory.method)
                .filter(|m| m.is_static())
                .ok_or_else(|| {
                    DiError::invalid(
                        id,
                        format!("'{}::{}' is not a static factory method", factory.target, factory.method),
                    )
                })?;
            return Ok((
                ConstructorBinding::StaticFactory {
                    class: factory.target.clone(),
                    method: factory.method.clone(),
                },
                method.params.as_slice(),
            ));
        }

        let class = def
            .class
            .as_ref()
            .ok_or_else(|| DiError::invalid(id, "definition has neither `class` nor `factory`"))?;
        let descriptor = self
            .types
            .get(class)
            .ok_or_else(|| DiError::invalid(id, format!("type '{}' is not registered", class)))?;
        if !descriptor.is_constructible() {
            return Err(DiError::invalid(id, format!("type '{}' has no constructor", class)));
        }
        Ok((ConstructorBinding::Class { class: class.clone() }, descriptor.params()))
    }

    fn wire_params(
        &self,
        id: &str,
        def: &ServiceDefinition,
        wiring: WiringMode,
        params: &[ParamDescriptor],
    ) -> DiResult<Vec<ArgumentSpec>> {
        match wiring {
            WiringMode::Explicit => Ok(Vec::new()),
            WiringMode::Autowire => params.iter().map(|p| self.autowire_param(id, p)).collect(),
            WiringMode::Annotwire => params.iter().map(|p| self.annotwire_param(id, def, p)).collect(),
        }
    }

    fn autowire_param(&self, id: &str, param: &ParamDescriptor) -> DiResult<ArgumentSpec> {
        let found = match &param.kind {
            ParamType::Service(type_name) => self
                .find_service_by_type(type_name, id)
                .map(ArgumentSpec::ServiceRef),
            ParamType::Primitive(_) if self.registry.has_parameter(&param.name) => {
                Some(ArgumentSpec::ParameterRef(param.name.clone()))
            }
            ParamType::Primitive(_) => None,
        };
        found
            .or_else(|| param.default.clone().map(ArgumentSpec::Literal))
            .ok_or_else(|| DiError::UnresolvableParameter {
                id: id.to_string(),
                parameter: param.name.clone(),
            })
    }

    fn annotwire_param(&self, id: &str, def: &ServiceDefinition, param: &ParamDescriptor) -> DiResult<ArgumentSpec> {
        let directive = def.inject.get(&param.name).or(param.inject.as_ref());
        match directive {
            Some(directive) => Ok(self.canonical(ArgumentSpec::parse_directive(directive))),
            None => param
                .default
                .clone()
                .map(ArgumentSpec::Literal)
                .ok_or_else(|| DiError::UnresolvableParameter {
                    id: id.to_string(),
                    parameter: param.name.clone(),
                }),
        }
    }

    /// Rewrites service references to canonical ids.
    fn canonical(&self, spec: ArgumentSpec) -> ArgumentSpec {
        match spec {
            ArgumentSpec::ServiceRef(target) => {
                ArgumentSpec::ServiceRef(self.registry.resolve_id(&target).to_string())
            }
            other => other,
        }
    }
}
