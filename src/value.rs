//! Literal and parameter values, and the arguments handed to constructors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};
use crate::traits::Service;

/// A configuration value: literal arguments, parameters and environment values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Try to view as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to convert to float; integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interpret a raw environment string the way environment sources do:
    /// integers, then floats, then booleans, else the string itself.
    pub fn from_env_str(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            Value::Integer(int_val)
        } else if let Ok(float_val) = raw.parse::<f64>() {
            Value::Float(float_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            Value::Boolean(bool_val)
        } else {
            Value::String(raw.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Shared handle to a built service.
pub type Instance = Arc<dyn Service>;

/// A fully resolved argument, ready to be passed to a constructor, factory or
/// method: either a plain value or another service instance.
#[derive(Clone)]
pub enum Injected {
    Value(Value),
    Service(Instance),
}

impl Injected {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Injected::Value(v) => Some(v),
            Injected::Service(_) => None,
        }
    }

    pub fn as_service(&self) -> Option<&Instance> {
        match self {
            Injected::Service(s) => Some(s),
            Injected::Value(_) => None,
        }
    }

    /// Expects a service, reporting `what` on mismatch.
    pub fn into_service(self, what: &str) -> DiResult<Instance> {
        match self {
            Injected::Service(s) => Ok(s),
            Injected::Value(v) => Err(DiError::construction(
                what,
                format!("expected a service instance, got value {}", v),
            )),
        }
    }

    /// Downcasts a service argument to its concrete type.
    pub fn downcast<T: Service>(&self) -> Option<&T> {
        self.as_service().and_then(|s| s.as_any().downcast_ref::<T>())
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Injected::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Injected::Service(s) => f.debug_tuple("Service").field(&s.type_name()).finish(),
        }
    }
}

impl From<Value> for Injected {
    fn from(v: Value) -> Self {
        Injected::Value(v)
    }
}

impl From<Instance> for Injected {
    fn from(s: Instance) -> Self {
        Injected::Service(s)
    }
}

/// Positional access helpers used by constructors registered in the type registry.
pub trait Arguments {
    /// Value argument at `index`.
    fn value(&self, index: usize) -> DiResult<&Value>;
    /// String argument at `index`.
    fn string(&self, index: usize) -> DiResult<String>;
    /// Service argument at `index`.
    fn service(&self, index: usize) -> DiResult<Instance>;
}

impl Arguments for [Injected] {
    fn value(&self, index: usize) -> DiResult<&Value> {
        match self.get(index) {
            Some(Injected::Value(v)) => Ok(v),
            Some(Injected::Service(s)) => Err(DiError::construction(
                s.type_name(),
                format!("argument {} is a service, expected a value", index),
            )),
            None => Err(DiError::construction("arguments", format!("missing argument {}", index))),
        }
    }

    fn string(&self, index: usize) -> DiResult<String> {
        Ok(self.value(index)?.to_string())
    }

    fn service(&self, index: usize) -> DiResult<Instance> {
        match self.get(index) {
            Some(Injected::Service(s)) => Ok(s.clone()),
            Some(Injected::Value(v)) => Err(DiError::construction(
                "arguments",
                format!("argument {} is the value {}, expected a service", index, v),
            )),
            None => Err(DiError::construction("arguments", format!("missing argument {}", index))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_strings_are_typed() {
        assert_eq!(Value::from_env_str("42"), Value::Integer(42));
        assert_eq!(Value::from_env_str("1.5"), Value::Float(1.5));
        assert_eq!(Value::from_env_str("true"), Value::Boolean(true));
        assert_eq!(Value::from_env_str("/var/data"), Value::String("/var/data".into()));
    }

    #[test]
    fn untagged_serde_matches_json_shapes() {
        let v: Value = serde_json::from_str(r#"{"a": [1, 2.5, "x", null, false]}"#).unwrap();
        let Value::Object(map) = &v else { panic!("expected object") };
        assert_eq!(
            map["a"],
            Value::Array(vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::String("x".into()),
                Value::Null,
                Value::Boolean(false),
            ])
        );
        assert_eq!(v.to_string(), r#"{"a":[1,2.5,"x",null,false]}"#);
    }
}
