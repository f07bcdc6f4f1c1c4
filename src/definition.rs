//! Raw service definitions, as written in definition documents or by builder calls.
//!
//! Every field is optional so that `extends` can layer a child over its
//! parent: a field the child leaves unset (or empty) is inherited.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::lifetime::{LazyStrategy, Scope, Visibility};
use crate::value::Value;

/// `[target, method]`: a static method on a type, or a method on `@service`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactorySpec {
    pub target: String,
    pub method: String,
}

impl FactorySpec {
    pub fn new(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
        }
    }

    /// The referenced service id when the target is written `@id`.
    pub fn service_target(&self) -> Option<&str> {
        self.target.strip_prefix('@').filter(|id| !id.is_empty())
    }
}

impl Serialize for FactorySpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.target, &self.method).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FactorySpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (target, method) = <(String, String)>::deserialize(deserializer)?;
        Ok(FactorySpec { target, method })
    }
}

/// `[method, args]` executed after construction. `args` may be omitted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

impl Serialize for MethodCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.method, &self.arguments).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MethodCall {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut parts = Vec::<Value>::deserialize(deserializer)?.into_iter();
        let method = match parts.next() {
            Some(Value::String(name)) => name,
            _ => return Err(de::Error::custom("method call must start with a method name")),
        };
        let arguments = match parts.next() {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(args)) => args,
            Some(single) => vec![single],
        };
        if parts.next().is_some() {
            return Err(de::Error::custom("method call takes at most [method, args]"));
        }
        Ok(MethodCall { method, arguments })
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// A raw service definition.
///
/// Key names follow the definition document format:
///
/// ```rust
/// use ferrous_wire::{ServiceDefinition, Scope, LazyStrategy};
///
/// let def: ServiceDefinition = serde_json::from_str(r#"{
///     "class": "MySQLAdapter",
///     "arguments": ["%db.path%", "@logger"],
///     "method_calls": [["setTimeout", [30]], ["connect"]],
///     "scope": "request",
///     "lazy": "method",
///     "lazy_method": "run",
///     "tags": ["db"],
///     "implements": "DatabaseAdapter"
/// }"#).unwrap();
///
/// assert_eq!(def.class.as_deref(), Some("MySQLAdapter"));
/// assert_eq!(def.method_calls.len(), 2);
/// assert!(def.method_calls[1].arguments.is_empty());
/// assert_eq!(def.scope, Some(Scope::Request));
/// assert_eq!(def.lazy, Some(LazyStrategy::Method));
/// assert_eq!(def.implements, vec!["DatabaseAdapter".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory: Option<FactorySpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub method_calls: Vec<MethodCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lazy: Option<LazyStrategy>,
    /// Method every call through a method proxy is forwarded to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lazy_method: Option<String>,
    /// Properties a property proxy initializes on first read
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lazy_properties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autowire: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotwire: Option<bool>,
    /// Per-parameter inject directives for annotwire, keyed by parameter name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inject: BTreeMap<String, String>,
    /// Id of the service this definition decorates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decorate: Option<String>,
    /// Id the decorated definition moves to; `<decorate>.inner` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoration_inner: Option<String>,
}

impl ServiceDefinition {
    /// A definition for a directly constructed type.
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::default()
        }
    }

    /// A definition built by `[target, method]`.
    pub fn factory(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            factory: Some(FactorySpec::new(target, method)),
            ..Self::default()
        }
    }

    pub fn with_arguments<I, V>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_lazy(mut self, lazy: LazyStrategy) -> Self {
        self.lazy = Some(lazy);
        self
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Layers `self` over `parent`: fields set on `self` win, the rest are
    /// inherited. `alias`, `decorate` and `extends` itself are never inherited.
    pub(crate) fn merged_over(&self, parent: &ServiceDefinition) -> ServiceDefinition {
        fn pick<T: Clone>(child: &Option<T>, parent: &Option<T>) -> Option<T> {
            child.clone().or_else(|| parent.clone())
        }
        fn pick_vec<T: Clone>(child: &[T], parent: &[T]) -> Vec<T> {
            if child.is_empty() { parent.to_vec() } else { child.to_vec() }
        }

        let mut inject = parent.inject.clone();
        inject.extend(self.inject.iter().map(|(k, v)| (k.clone(), v.clone())));

        ServiceDefinition {
            class: pick(&self.class, &parent.class),
            factory: pick(&self.factory, &parent.factory),
            arguments: pick_vec(&self.arguments, &parent.arguments),
            method_calls: pick_vec(&self.method_calls, &parent.method_calls),
            scope: pick(&self.scope, &parent.scope),
            visibility: pick(&self.visibility, &parent.visibility),
            shared: pick(&self.shared, &parent.shared),
            lazy: pick(&self.lazy, &parent.lazy),
            lazy_method: pick(&self.lazy_method, &parent.lazy_method),
            lazy_properties: pick_vec(&self.lazy_properties, &parent.lazy_properties),
            extends: self.extends.clone(),
            alias: self.alias.clone(),
            tags: pick_vec(&self.tags, &parent.tags),
            implements: pick_vec(&self.implements, &parent.implements),
            autowire: pick(&self.autowire, &parent.autowire),
            annotwire: pick(&self.annotwire, &parent.annotwire),
            inject,
            decorate: self.decorate.clone(),
            decoration_inner: self.decoration_inner.clone(),
        }
    }
}

/// A service entry: either a bare class name or a full definition.
#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionEntry {
    Class(String),
    Full(Box<ServiceDefinition>),
}

impl From<DefinitionEntry> for ServiceDefinition {
    fn from(entry: DefinitionEntry) -> Self {
        match entry {
            DefinitionEntry::Class(class) => ServiceDefinition::class(class),
            DefinitionEntry::Full(def) => *def,
        }
    }
}

/// Container-wide defaults declared in a definition document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefinitionDefaults {
    /// Visibility of services that do not set one
    pub public: Option<bool>,
    pub autowire: Option<bool>,
    pub annotwire: Option<bool>,
}

/// A whole definition document: parameters, defaults and services.
///
/// Services keep their document order, which decides "first match wins"
/// during autowiring.
///
/// ```rust
/// use ferrous_wire::DefinitionSet;
///
/// let set: DefinitionSet = serde_json::from_str(r#"{
///     "parameters": { "db.path": "/var/data" },
///     "defaults": { "autowire": true },
///     "services": {
///         "logger": "FileLogger",
///         "db": { "class": "MySQLAdapter", "arguments": ["%db.path%"] }
///     }
/// }"#).unwrap();
///
/// let ids: Vec<&str> = set.services.iter().map(|(id, _)| id.as_str()).collect();
/// assert_eq!(ids, ["logger", "db"]);
/// assert_eq!(set.services[0].1.class.as_deref(), Some("FileLogger"));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefinitionSet {
    pub parameters: BTreeMap<String, Value>,
    pub defaults: DefinitionDefaults,
    #[serde(deserialize_with = "ordered_services")]
    pub services: Vec<(String, ServiceDefinition)>,
}

fn ordered_services<'de, D>(deserializer: D) -> Result<Vec<(String, ServiceDefinition)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedServices;

    impl<'de> Visitor<'de> for OrderedServices {
        type Value = Vec<(String, ServiceDefinition)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of service id to definition")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut services = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((id, entry)) = map.next_entry::<String, DefinitionEntry>()? {
                if services.iter().any(|(existing, _)| existing == &id) {
                    return Err(de::Error::custom(format!("duplicate service id '{}'", id)));
                }
                services.push((id, entry.into()));
            }
            Ok(services)
        }
    }

    deserializer.deserialize_map(OrderedServices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_fields_win_and_the_rest_is_inherited() {
        let parent = ServiceDefinition {
            class: Some("Base".into()),
            arguments: vec!["x".into()],
            scope: Some(Scope::Request),
            tags: vec!["t".into()],
            alias: Some("base_alias".into()),
            ..Default::default()
        };
        let child = ServiceDefinition {
            arguments: vec!["y".into()],
            extends: Some("b".into()),
            ..Default::default()
        };

        let merged = child.merged_over(&parent);
        assert_eq!(merged.arguments, vec![Value::from("y")]);
        assert_eq!(merged.class.as_deref(), Some("Base"));
        assert_eq!(merged.scope, Some(Scope::Request));
        assert_eq!(merged.tags, vec!["t".to_string()]);
        assert_eq!(merged.alias, None);
    }

    #[test]
    fn factory_and_method_calls_use_array_shapes() {
        let def: ServiceDefinition = serde_json::from_str(
            r#"{"factory": ["@conn_factory", "create"], "method_calls": [["setLogger", "@logger"]]}"#,
        )
        .unwrap();
        let factory = def.factory.as_ref().unwrap();
        assert_eq!(factory.service_target(), Some("conn_factory"));
        assert_eq!(def.method_calls[0].arguments, vec![Value::from("@logger")]);

        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains(r#""factory":["@conn_factory","create"]"#));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<ServiceDefinition>(r#"{"clas": "Typo"}"#).is_err());
    }

    #[test]
    fn duplicate_service_ids_are_rejected() {
        let doc = r#"{"services": {"a": "A", "a": "B"}}"#;
        assert!(serde_json::from_str::<DefinitionSet>(doc).is_err());
    }
}
