//! Lazy proxies: stand-ins that defer construction until first use.
//!
//! All three proxies build their target through a materializer handed out by
//! the container and memoize it, so a proxy constructs its target at most
//! once. They forward every [`Service`] capability, so callers need not know
//! whether the target already exists.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult};
use crate::traits::Service;
use crate::types::TypeDescriptor;
use crate::value::{Injected, Instance};

/// Builds the real instance behind a proxy.
pub(crate) type Materializer = Box<dyn Fn() -> DiResult<Instance> + Send + Sync>;

/// Forward-and-memoize holder for a proxy's target.
struct Deferred {
    build: Materializer,
    cell: OnceCell<Instance>,
}

impl Deferred {
    fn new(build: Materializer) -> Self {
        Self {
            build,
            cell: OnceCell::new(),
        }
    }

    fn get(&self) -> DiResult<&Instance> {
        self.cell.get_or_try_init(|| (self.build)())
    }

    fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    fn cleanup(&self) {
        if let Some(target) = self.cell.get() {
            target.cleanup();
        }
    }
}

/// Full-class proxy: the target is built on first method or property access.
pub struct ClassProxy {
    id: String,
    type_name: String,
    target: Deferred,
}

impl ClassProxy {
    pub(crate) fn new(id: &str, type_name: Option<&str>, build: Materializer) -> Self {
        Self {
            id: id.to_string(),
            type_name: type_name.unwrap_or(id).to_string(),
            target: Deferred::new(build),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.target.is_initialized()
    }

    /// The real instance, built if needed.
    pub fn target(&self) -> DiResult<Instance> {
        self.target.get().cloned()
    }
}

impl Service for ClassProxy {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn invoke(&self, method: &str, args: Vec<Injected>) -> DiResult<Injected> {
        self.target.get()?.invoke(method, args)
    }

    fn get_property(&self, name: &str) -> DiResult<Injected> {
        self.target.get()?.get_property(name)
    }

    fn set_property(&self, name: &str, value: Injected) -> DiResult<()> {
        self.target.get()?.set_property(name, value)
    }

    fn cleanup(&self) {
        self.target.cleanup();
    }
}

/// Method proxy: every call, whatever the requested name, goes to one bound method.
pub struct MethodProxy {
    id: String,
    method: String,
    target: Deferred,
}

impl MethodProxy {
    pub(crate) fn new(id: &str, method: &str, build: Materializer) -> Self {
        Self {
            id: id.to_string(),
            method: method.to_string(),
            target: Deferred::new(build),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The method all calls are forwarded to.
    pub fn bound_method(&self) -> &str {
        &self.method
    }

    pub fn is_initialized(&self) -> bool {
        self.target.is_initialized()
    }

    /// Calls the bound method directly.
    pub fn call(&self, args: Vec<Injected>) -> DiResult<Injected> {
        self.target.get()?.invoke(&self.method, args)
    }
}

impl Service for MethodProxy {
    fn type_name(&self) -> &str {
        "MethodProxy"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn invoke(&self, _method: &str, args: Vec<Injected>) -> DiResult<Injected> {
        self.call(args)
    }

    fn get_property(&self, name: &str) -> DiResult<Injected> {
        self.target.get()?.get_property(name)
    }

    fn set_property(&self, name: &str, value: Injected) -> DiResult<()> {
        self.target.get()?.set_property(name, value)
    }

    fn cleanup(&self) {
        self.target.cleanup();
    }
}

/// Property proxy: listed properties are computed by their deferred
/// initializer on first read. Writes go straight to the target and count as
/// initialization.
pub struct PropertyProxy {
    id: String,
    type_name: String,
    descriptor: Option<Arc<TypeDescriptor>>,
    deferred: HashMap<String, OnceCell<()>>,
    target: Deferred,
}

impl PropertyProxy {
    pub(crate) fn new(
        id: &str,
        descriptor: Option<Arc<TypeDescriptor>>,
        properties: &[String],
        build: Materializer,
    ) -> Self {
        Self {
            id: id.to_string(),
            type_name: descriptor
                .as_ref()
                .map(|d| d.name().to_string())
                .unwrap_or_else(|| id.to_string()),
            descriptor,
            deferred: properties.iter().map(|p| (p.clone(), OnceCell::new())).collect(),
            target: Deferred::new(build),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.target.is_initialized()
    }

    /// True once `property` has been initialized or written.
    pub fn is_property_initialized(&self, property: &str) -> bool {
        self.deferred
            .get(property)
            .map(|cell| cell.get().is_some())
            .unwrap_or(false)
    }

    fn initialize(&self, name: &str, target: &Instance) -> DiResult<()> {
        let initializer = self
            .descriptor
            .as_ref()
            .and_then(|d| d.property_initializer(name))
            .ok_or_else(|| DiError::PropertyNotFound {
                target: self.type_name.clone(),
                property: name.to_string(),
            })?;
        let value = initializer(target.as_ref())?;
        target.set_property(name, value)
    }
}

impl Service for PropertyProxy {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn invoke(&self, method: &str, args: Vec<Injected>) -> DiResult<Injected> {
        self.target.get()?.invoke(method, args)
    }

    fn get_property(&self, name: &str) -> DiResult<Injected> {
        let target = self.target.get()?;
        if let Some(cell) = self.deferred.get(name) {
            cell.get_or_try_init(|| self.initialize(name, target))?;
        }
        target.get_property(name)
    }

    fn set_property(&self, name: &str, value: Injected) -> DiResult<()> {
        let target = self.target.get()?;
        target.set_property(name, value)?;
        if let Some(cell) = self.deferred.get(name) {
            let _ = cell.set(());
        }
        Ok(())
    }

    fn cleanup(&self) {
        self.target.cleanup();
    }
}

impl fmt::Debug for ClassProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassProxy")
            .field("id", &self.id)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl fmt::Debug for MethodProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodProxy")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl fmt::Debug for PropertyProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyProxy")
            .field("id", &self.id)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// True when `instance` is a lazy proxy.
pub fn is_proxy(instance: &Instance) -> bool {
    let any = instance.as_any();
    any.is::<ClassProxy>() || any.is::<MethodProxy>() || any.is::<PropertyProxy>()
}

/// The real object behind `instance`, materializing a proxy if needed.
/// Non-proxy instances are returned as they are.
///
/// ```
/// use ferrous_wire::{lazy, ContainerBuilder, LazyStrategy, Service, TypeDescriptor};
/// use std::any::Any;
/// use std::sync::Arc;
///
/// struct Report;
/// impl Service for Report {
///     fn type_name(&self) -> &str { "Report" }
///     fn as_any(&self) -> &dyn Any { self }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_type(TypeDescriptor::new("Report", |_| Ok(Arc::new(Report))));
/// builder.set_class("report", "Report").set_lazy("report", LazyStrategy::Class);
/// let container = builder.build().unwrap();
///
/// let proxy = container.get("report").unwrap();
/// assert!(lazy::is_proxy(&proxy));
/// let real = lazy::real_instance(&proxy).unwrap();
/// assert!(real.downcast_ref::<Report>().is_some());
/// ```
pub fn real_instance(instance: &Instance) -> DiResult<Instance> {
    let any = instance.as_any();
    if let Some(proxy) = any.downcast_ref::<ClassProxy>() {
        return proxy.target.get().cloned();
    }
    if let Some(proxy) = any.downcast_ref::<MethodProxy>() {
        return proxy.target.get().cloned();
    }
    if let Some(proxy) = any.downcast_ref::<PropertyProxy>() {
        return proxy.target.get().cloned();
    }
    Ok(instance.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Worker {
        calls: Mutex<Vec<String>>,
        title: Mutex<Option<String>>,
    }

    impl Service for Worker {
        fn type_name(&self) -> &str {
            "Worker"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn invoke(&self, method: &str, _args: Vec<Injected>) -> DiResult<Injected> {
            match method {
                "run" => {
                    self.calls.lock().push(method.to_string());
                    Ok(Injected::Value(Value::from("ran")))
                }
                other => Err(DiError::MethodNotFound { target: "Worker".into(), method: other.into() }),
            }
        }
        fn get_property(&self, name: &str) -> DiResult<Injected> {
            match name {
                "title" => Ok(Injected::Value(self.title.lock().clone().map(Value::from).unwrap_or_default())),
                other => Err(DiError::PropertyNotFound { target: "Worker".into(), property: other.into() }),
            }
        }
        fn set_property(&self, name: &str, value: Injected) -> DiResult<()> {
            match (name, value) {
                ("title", Injected::Value(v)) => {
                    *self.title.lock() = Some(v.to_string());
                    Ok(())
                }
                (other, _) => Err(DiError::PropertyNotFound { target: "Worker".into(), property: other.into() }),
            }
        }
    }

    fn counting_builder(count: &Arc<AtomicUsize>) -> Materializer {
        let count = count.clone();
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Worker { calls: Mutex::new(Vec::new()), title: Mutex::new(None) }) as Instance)
        })
    }

    #[test]
    fn class_proxy_builds_once_on_first_call() {
        let count = Arc::new(AtomicUsize::new(0));
        let proxy = ClassProxy::new("worker", Some("Worker"), counting_builder(&count));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(proxy.type_name(), "Worker");

        proxy.invoke("run", vec![]).unwrap();
        proxy.invoke("run", vec![]).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(matches!(proxy.invoke("stop", vec![]), Err(DiError::MethodNotFound { .. })));
    }

    #[test]
    fn method_proxy_forwards_any_name_to_the_bound_method() {
        let count = Arc::new(AtomicUsize::new(0));
        let proxy = MethodProxy::new("worker", "run", counting_builder(&count));
        assert!(!proxy.is_initialized());

        let out = proxy.invoke("anything", vec![]).unwrap();
        assert_eq!(out.as_value(), Some(&Value::from("ran")));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let wrong = MethodProxy::new("worker", "missing", counting_builder(&count));
        assert!(matches!(wrong.invoke("run", vec![]), Err(DiError::MethodNotFound { method, .. }) if method == "missing"));
    }

    #[test]
    fn property_proxy_initializes_once_and_writes_pass_through() {
        let inits = Arc::new(AtomicUsize::new(0));
        let seen = inits.clone();
        let descriptor = Arc::new(
            TypeDescriptor::abstract_type("Worker").lazy_property("title", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(Injected::Value(Value::from("computed")))
            }),
        );
        let count = Arc::new(AtomicUsize::new(0));
        let proxy = PropertyProxy::new("worker", Some(descriptor.clone()), &["title".to_string()], counting_builder(&count));

        let first = proxy.get_property("title").unwrap();
        let second = proxy.get_property("title").unwrap();
        assert_eq!(first.as_value(), Some(&Value::from("computed")));
        assert_eq!(second.as_value(), Some(&Value::from("computed")));
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        let written = PropertyProxy::new("worker", Some(descriptor), &["title".to_string()], counting_builder(&count));
        written.set_property("title", Injected::Value(Value::from("manual"))).unwrap();
        assert!(written.is_property_initialized("title"));
        assert_eq!(written.get_property("title").unwrap().as_value(), Some(&Value::from("manual")));
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_materialization_can_be_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let proxy = ClassProxy::new(
            "flaky",
            None,
            Box::new(move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DiError::construction("flaky", "first attempt fails"))
                } else {
                    Ok(Arc::new(Worker { calls: Mutex::new(Vec::new()), title: Mutex::new(None) }) as Instance)
                }
            }),
        );
        assert!(proxy.invoke("run", vec![]).is_err());
        assert!(proxy.invoke("run", vec![]).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
