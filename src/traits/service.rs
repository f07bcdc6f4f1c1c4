//! The dynamic object interface every built service exposes.

use std::any::Any;

use crate::error::{DiError, DiResult};
use crate::value::Injected;

/// Capability interface for container-managed objects.
///
/// The container never inspects live types. It talks to instances through
/// this trait: method calls declared in a definition go through
/// [`invoke`](Service::invoke), lazy property proxies use
/// [`get_property`](Service::get_property) /
/// [`set_property`](Service::set_property), and lifecycle teardown calls
/// [`cleanup`](Service::cleanup).
///
/// Only [`type_name`](Service::type_name) and [`as_any`](Service::as_any)
/// are required. The defaults report that no such method or property exists.
///
/// Method calls run through `&self`; services that accept setter calls keep
/// their mutable state behind a lock.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{DiResult, Injected, Service, Value};
/// use parking_lot::Mutex;
/// use std::any::Any;
///
/// struct Mailer {
///     transport: Mutex<String>,
/// }
///
/// impl Service for Mailer {
///     fn type_name(&self) -> &str { "Mailer" }
///     fn as_any(&self) -> &dyn Any { self }
///
///     fn invoke(&self, method: &str, args: Vec<Injected>) -> DiResult<Injected> {
///         match method {
///             "setTransport" => {
///                 let value = args.first().and_then(|a| a.as_value()).cloned().unwrap_or_default();
///                 *self.transport.lock() = value.to_string();
///                 Ok(Injected::Value(Value::Null))
///             }
///             other => Err(ferrous_wire::DiError::MethodNotFound {
///                 target: "Mailer".into(),
///                 method: other.into(),
///             }),
///         }
///     }
/// }
///
/// let mailer = Mailer { transport: Mutex::new(String::new()) };
/// mailer.invoke("setTransport", vec![Injected::Value("smtp".into())]).unwrap();
/// assert_eq!(*mailer.transport.lock(), "smtp");
/// assert!(mailer.invoke("send", vec![]).is_err());
/// ```
pub trait Service: Any + Send + Sync {
    /// Name of the concrete type, as registered in the type registry.
    fn type_name(&self) -> &str;

    /// Access to the concrete type for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Calls a named method with already-resolved arguments.
    fn invoke(&self, method: &str, _args: Vec<Injected>) -> DiResult<Injected> {
        Err(DiError::MethodNotFound {
            target: self.type_name().to_string(),
            method: method.to_string(),
        })
    }

    /// Reads a named property.
    fn get_property(&self, name: &str) -> DiResult<Injected> {
        Err(DiError::PropertyNotFound {
            target: self.type_name().to_string(),
            property: name.to_string(),
        })
    }

    /// Writes a named property.
    fn set_property(&self, name: &str, _value: Injected) -> DiResult<()> {
        Err(DiError::PropertyNotFound {
            target: self.type_name().to_string(),
            property: name.to_string(),
        })
    }

    /// Lifecycle hook run at request end or container shutdown.
    fn cleanup(&self) {}
}

impl dyn Service {
    /// Downcasts to a concrete service type.
    pub fn downcast_ref<T: Service>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
