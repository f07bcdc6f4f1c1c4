//! Service scope, visibility, laziness and wiring mode definitions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Service scopes controlling instance caching behavior
///
/// # Scope Characteristics
///
/// - **Singleton**: one instance per container, cached for the container lifetime
/// - **Request**: one instance per request, cache dropped at the request boundary
/// - **Prototype**: fresh instance on every resolution, never cached
/// - **Proxy**: reserved; resolving fails with `NotImplemented`
/// - **Private**: cached like a singleton but only reachable as a dependency
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ContainerBuilder, Scope};
/// # use ferrous_wire::{TypeDescriptor, Service};
/// # use std::sync::Arc;
/// # struct Clock;
/// # impl Service for Clock { fn type_name(&self) -> &str { "Clock" } fn as_any(&self) -> &dyn std::any::Any { self } }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_type(TypeDescriptor::new("Clock", |_| Ok(Arc::new(Clock))));
/// builder.set_class("clock", "Clock").set_scope("clock", Scope::Prototype);
///
/// let container = builder.build().unwrap();
/// let a = container.get("clock").unwrap();
/// let b = container.get("clock").unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Single instance per container, cached forever
    #[default]
    Singleton,
    /// Single instance per request, cached until `end_request`
    Request,
    /// New instance per resolution, never cached
    Prototype,
    /// Deferred remote proxy scope, not available yet
    Proxy,
    /// Singleton that external callers cannot see
    Private,
}

impl Scope {
    /// Parses the lowercase scope name used in definition documents.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "singleton" => Some(Scope::Singleton),
            "request" => Some(Scope::Request),
            "prototype" => Some(Scope::Prototype),
            "proxy" => Some(Scope::Proxy),
            "private" => Some(Scope::Private),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Request => "request",
            Scope::Prototype => "prototype",
            Scope::Proxy => "proxy",
            Scope::Private => "private",
        }
    }
}

/// Whether a direct external `get` may reach the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Global,
    Private,
}

/// How argument lists are produced when the definition does not spell them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WiringMode {
    /// Only the declared `arguments` are used
    #[default]
    Explicit,
    /// Constructor/method parameters are matched by declared type
    Autowire,
    /// Constructor/method parameters follow their inject directives
    Annotwire,
}

/// Deferred-instantiation strategy for a service.
///
/// In definition documents this is written as `false`, `true` (class proxy),
/// `"method"`, `"property"` or `"class"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LazyStrategy {
    #[default]
    None,
    /// Every call is forwarded to one bound method
    Method,
    /// Listed properties are initialized on first read
    Property,
    /// The whole instance is built on first use
    Class,
}

impl LazyStrategy {
    pub fn is_lazy(&self) -> bool {
        !matches!(self, LazyStrategy::None)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LazyRepr {
    Flag(bool),
    Named(String),
}

impl Serialize for LazyStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            LazyStrategy::None => LazyRepr::Flag(false),
            LazyStrategy::Class => LazyRepr::Flag(true),
            LazyStrategy::Method => LazyRepr::Named("method".to_string()),
            LazyStrategy::Property => LazyRepr::Named("property".to_string()),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LazyStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match LazyRepr::deserialize(deserializer)? {
            LazyRepr::Flag(false) => Ok(LazyStrategy::None),
            LazyRepr::Flag(true) => Ok(LazyStrategy::Class),
            LazyRepr::Named(name) => match name.as_str() {
                "method" => Ok(LazyStrategy::Method),
                "property" => Ok(LazyStrategy::Property),
                "class" | "true" => Ok(LazyStrategy::Class),
                "false" | "none" => Ok(LazyStrategy::None),
                other => Err(serde::de::Error::custom(format!(
                    "unknown lazy strategy '{}'",
                    other
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_accepts_flags_and_names() {
        let parsed: Vec<LazyStrategy> =
            serde_json::from_str(r#"[false, true, "method", "property", "class"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                LazyStrategy::None,
                LazyStrategy::Class,
                LazyStrategy::Method,
                LazyStrategy::Property,
                LazyStrategy::Class,
            ]
        );
        assert!(serde_json::from_str::<LazyStrategy>(r#""sometimes""#).is_err());
    }

    #[test]
    fn scope_names_round_trip() {
        for scope in [Scope::Singleton, Scope::Request, Scope::Prototype, Scope::Proxy, Scope::Private] {
            assert_eq!(Scope::parse(scope.as_str()), Some(scope));
        }
        assert_eq!(Scope::parse("session"), None);
    }
}
