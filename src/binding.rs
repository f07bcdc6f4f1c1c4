//! Resolved bindings: the normalized form of a definition, ready to build.

use serde::{Deserialize, Serialize};

use crate::lifetime::{LazyStrategy, Scope, Visibility};
use crate::value::Value;

/// One resolved argument.
///
/// Raw definition values are parsed with [`ArgumentSpec::parse`]:
///
/// ```rust
/// use ferrous_wire::{ArgumentSpec, Value};
///
/// assert_eq!(ArgumentSpec::parse(&"@logger".into()), ArgumentSpec::ServiceRef("logger".into()));
/// assert_eq!(ArgumentSpec::parse(&"%db.path%".into()), ArgumentSpec::ParameterRef("db.path".into()));
/// assert_eq!(ArgumentSpec::parse(&"$HOME$".into()), ArgumentSpec::EnvRef("HOME".into()));
/// assert_eq!(ArgumentSpec::parse(&"@@handle".into()), ArgumentSpec::Literal("@handle".into()));
/// assert_eq!(ArgumentSpec::parse(&Value::Integer(3)), ArgumentSpec::Literal(Value::Integer(3)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgumentSpec {
    Literal(Value),
    ParameterRef(String),
    EnvRef(String),
    ServiceRef(String),
}

impl ArgumentSpec {
    /// Classifies a raw argument. Only strings can be references; `@@x`
    /// escapes to the literal `@x`, and empty names stay literal.
    pub fn parse(raw: &Value) -> ArgumentSpec {
        let Value::String(s) = raw else {
            return ArgumentSpec::Literal(raw.clone());
        };
        if let Some(rest) = s.strip_prefix("@@") {
            return ArgumentSpec::Literal(Value::String(format!("@{}", rest)));
        }
        if let Some(id) = s.strip_prefix('@') {
            if !id.is_empty() {
                return ArgumentSpec::ServiceRef(id.to_string());
            }
        }
        if let Some(name) = wrapped(s, '%') {
            return ArgumentSpec::ParameterRef(name.to_string());
        }
        if let Some(name) = wrapped(s, '$') {
            return ArgumentSpec::EnvRef(name.to_string());
        }
        ArgumentSpec::Literal(raw.clone())
    }

    /// Parses an inject directive; a bare word is a literal.
    pub fn parse_directive(directive: &str) -> ArgumentSpec {
        Self::parse(&Value::String(directive.to_string()))
    }

    pub fn service_id(&self) -> Option<&str> {
        match self {
            ArgumentSpec::ServiceRef(id) => Some(id),
            _ => None,
        }
    }
}

fn wrapped(s: &str, marker: char) -> Option<&str> {
    s.strip_prefix(marker)
        .and_then(|rest| rest.strip_suffix(marker))
        .filter(|inner| !inner.is_empty())
}

/// How the instance itself comes into being.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstructorBinding {
    /// Direct construction of a registered type
    Class { class: String },
    /// Static method on a type
    StaticFactory { class: String, method: String },
    /// Method on another service's instance
    ServiceFactory { service: String, method: String },
    /// Pre-built instance handed to the container
    Synthetic,
}

/// A resolved post-construction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCallBinding {
    pub method: String,
    pub arguments: Vec<ArgumentSpec>,
}

/// Fully resolved form of a service definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub id: String,
    pub constructor: ConstructorBinding,
    /// Concrete type, when known; factory outputs may stay unknown
    pub concrete_type: Option<String>,
    pub arguments: Vec<ArgumentSpec>,
    pub method_calls: Vec<MethodCallBinding>,
    /// Properties assigned after construction, before method calls
    pub property_injections: Vec<(String, ArgumentSpec)>,
    pub scope: Scope,
    pub visibility: Visibility,
    pub shared: bool,
    pub lazy: LazyStrategy,
    pub lazy_method: Option<String>,
    pub lazy_properties: Vec<String>,
    pub tags: Vec<String>,
    pub implements: Vec<String>,
}

impl Binding {
    /// Every service id this binding needs to be built, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        let factory = match &self.constructor {
            ConstructorBinding::ServiceFactory { service, .. } => Some(service.as_str()),
            _ => None,
        };
        factory
            .into_iter()
            .chain(self.arguments.iter().filter_map(ArgumentSpec::service_id))
            .chain(self.property_injections.iter().filter_map(|(_, a)| a.service_id()))
            .chain(
                self.method_calls
                    .iter()
                    .flat_map(|c| c.arguments.iter().filter_map(ArgumentSpec::service_id)),
            )
    }

    /// True when built instances are kept in a scope cache.
    pub fn is_cached(&self) -> bool {
        self.shared && !matches!(self.scope, Scope::Prototype)
    }

    pub(crate) fn synthetic(id: &str) -> Self {
        Binding {
            id: id.to_string(),
            constructor: ConstructorBinding::Synthetic,
            concrete_type: None,
            arguments: Vec::new(),
            method_calls: Vec::new(),
            property_injections: Vec::new(),
            scope: Scope::Singleton,
            visibility: Visibility::Global,
            shared: true,
            lazy: LazyStrategy::None,
            lazy_method: None,
            lazy_properties: Vec::new(),
            tags: Vec::new(),
            implements: Vec::new(),
        }
    }
}
