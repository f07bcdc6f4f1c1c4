//! Instance construction from bindings.

use std::sync::Arc;

use tracing::trace;

use super::context::ResolutionContext;
use super::Container;
use crate::binding::{ArgumentSpec, Binding, ConstructorBinding};
use crate::error::{DiError, DiResult};
use crate::lazy::{ClassProxy, Materializer, MethodProxy, PropertyProxy};
use crate::lifetime::LazyStrategy;
use crate::value::{Injected, Instance};

impl Container {
    /// Builds a fresh instance: constructor or factory, then property
    /// injections, then method calls in declared order. A failing method call
    /// aborts the build but earlier calls are not undone.
    pub(crate) fn instantiate(&self, binding: &Binding, ctx: &mut ResolutionContext) -> DiResult<Instance> {
        let id = binding.id.as_str();
        let arguments = self.resolve_arguments(&binding.arguments, id, ctx)?;

        let instance = match &binding.constructor {
            ConstructorBinding::Class { class } => {
                let descriptor = self.inner.types.get(class).ok_or_else(|| {
                    DiError::invalid(id, format!("class `{}` is not registered", class))
                })?;
                descriptor.construct(arguments)?
            }
            ConstructorBinding::StaticFactory { class, method } => {
                let function = self
                    .inner
                    .types
                    .get(class)
                    .and_then(|d| d.method_descriptor(method))
                    .and_then(|m| m.function.clone())
                    .ok_or_else(|| DiError::MethodNotFound {
                        target: class.clone(),
                        method: method.clone(),
                    })?;
                function(arguments)?.into_service(id)?
            }
            ConstructorBinding::ServiceFactory { service, method } => {
                let holder = self.resolve(service, ctx, true, false)?;
                holder.invoke(method, arguments)?.into_service(id)?
            }
            ConstructorBinding::Synthetic => return Err(DiError::ServiceNotFound(id.to_string())),
        };

        for (property, spec) in &binding.property_injections {
            let value = self.resolve_argument(spec, id, ctx)?;
            instance.set_property(property, value)?;
        }

        for call in &binding.method_calls {
            let arguments = self.resolve_arguments(&call.arguments, id, ctx)?;
            trace!(service = %id, method = %call.method, "method call");
            instance.invoke(&call.method, arguments)?;
        }

        self.inner.observers.constructed(id);
        Ok(instance)
    }

    fn resolve_arguments(
        &self,
        specs: &[ArgumentSpec],
        owner: &str,
        ctx: &mut ResolutionContext,
    ) -> DiResult<Vec<Injected>> {
        specs.iter().map(|spec| self.resolve_argument(spec, owner, ctx)).collect()
    }

    fn resolve_argument(&self, spec: &ArgumentSpec, owner: &str, ctx: &mut ResolutionContext) -> DiResult<Injected> {
        match spec {
            ArgumentSpec::Literal(value) => Ok(Injected::Value(value.clone())),
            ArgumentSpec::ParameterRef(name) => self
                .inner
                .parameters
                .read()
                .get(name)
                .cloned()
                .map(Injected::Value)
                .ok_or_else(|| DiError::UnresolvableParameter {
                    id: owner.to_string(),
                    parameter: name.clone(),
                }),
            ArgumentSpec::EnvRef(name) => self
                .inner
                .environment
                .get(name)
                .cloned()
                .map(Injected::Value)
                .ok_or_else(|| DiError::UnresolvableParameter {
                    id: owner.to_string(),
                    parameter: name.clone(),
                }),
            ArgumentSpec::ServiceRef(id) => self.resolve(id, ctx, true, false).map(Injected::Service),
        }
    }

    /// Wraps the binding in the proxy its lazy strategy asks for. The proxy
    /// builds the real instance on first use, outside of any caller's
    /// resolution.
    pub(crate) fn make_proxy(&self, binding: &Arc<Binding>) -> DiResult<Instance> {
        let build = self.materializer(binding.clone());
        let id = binding.id.as_str();
        let proxy: Instance = match binding.lazy {
            LazyStrategy::Class => Arc::new(ClassProxy::new(id, binding.concrete_type.as_deref(), build)),
            LazyStrategy::Method => {
                let method = binding
                    .lazy_method
                    .as_deref()
                    .ok_or_else(|| DiError::invalid(id, "method proxy requires `lazy_method`"))?;
                Arc::new(MethodProxy::new(id, method, build))
            }
            LazyStrategy::Property => {
                let descriptor = binding
                    .concrete_type
                    .as_deref()
                    .and_then(|t| self.inner.types.get(t))
                    .cloned();
                Arc::new(PropertyProxy::new(id, descriptor, &binding.lazy_properties, build))
            }
            LazyStrategy::None => return build(),
        };
        trace!(service = %id, strategy = ?binding.lazy, "lazy proxy created");
        Ok(proxy)
    }

    fn materializer(&self, binding: Arc<Binding>) -> Materializer {
        let container = Arc::downgrade(&self.inner);
        Box::new(move || {
            let inner = container.upgrade().ok_or_else(|| {
                DiError::construction(binding.id.clone(), "container was dropped before the lazy service was used")
            })?;
            let container = Container { inner };
            container.check_cycle_free(&binding.id)?;
            let mut ctx = ResolutionContext::new();
            ctx.guarded(&binding.id, |ctx| container.instantiate(&binding, ctx))
        })
    }
}
