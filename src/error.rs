//! Error types for the service container.

use std::fmt;

/// Container errors
///
/// Represents the various error conditions that can occur while loading
/// definitions, building the binding graph, or resolving services.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ContainerBuilder, DiError};
///
/// let container = ContainerBuilder::new().build().unwrap();
/// match container.get("mailer") {
///     Err(DiError::ServiceNotFound(id)) => assert_eq!(id, "mailer"),
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_wire::DiError;
///
/// let circular = DiError::CircularDependency(vec!["a".into(), "b".into(), "a".into()]);
/// assert_eq!(circular.to_string(), "Circular dependency: a -> b -> a");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum DiError {
    /// Unknown id, or a private-scoped id requested from outside the graph
    ServiceNotFound(String),
    /// Definition is malformed (missing class/factory, bad extends chain, ...)
    InvalidDefinition { id: String, reason: String },
    /// `extends` names a parent that is not registered
    UnknownParent { id: String, parent: String },
    /// Circular dependency detected (includes the full chain)
    CircularDependency(Vec<String>),
    /// Autowire/annotwire could not produce an argument
    UnresolvableParameter { id: String, parameter: String },
    /// Visibility violation on an external request
    AccessDenied(String),
    /// Feature declared but not available (the `proxy` scope)
    NotImplemented(String),
    /// Target has no method with this name
    MethodNotFound { target: String, method: String },
    /// Parameter table has no entry with this name
    ParameterNotFound(String),
    /// Target has no readable/writable property with this name
    PropertyNotFound { target: String, property: String },
    /// A constructor, factory or method call reported a failure
    Construction { id: String, message: String },
    /// The persisted graph could not be encoded or decoded
    Cache(String),
}

impl DiError {
    /// Shorthand for a construction failure raised by user code.
    pub fn construction(id: impl Into<String>, message: impl fmt::Display) -> Self {
        DiError::Construction {
            id: id.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        DiError::InvalidDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::ServiceNotFound(id) => write!(f, "Service not found: {}", id),
            DiError::InvalidDefinition { id, reason } => {
                write!(f, "Invalid definition for '{}': {}", id, reason)
            }
            DiError::UnknownParent { id, parent } => {
                write!(f, "Service '{}' extends unknown parent '{}'", id, parent)
            }
            DiError::CircularDependency(chain) => {
                write!(f, "Circular dependency: {}", chain.join(" -> "))
            }
            DiError::UnresolvableParameter { id, parameter } => {
                write!(f, "Unable to resolve parameter '{}' of service '{}'", parameter, id)
            }
            DiError::AccessDenied(id) => {
                write!(f, "Service '{}' is not accessible externally", id)
            }
            DiError::NotImplemented(what) => write!(f, "Not implemented: {}", what),
            DiError::MethodNotFound { target, method } => {
                write!(f, "Method '{}' not found on '{}'", method, target)
            }
            DiError::ParameterNotFound(name) => write!(f, "Parameter not found: {}", name),
            DiError::PropertyNotFound { target, property } => {
                write!(f, "Property '{}' not found on '{}'", property, target)
            }
            DiError::Construction { id, message } => {
                write!(f, "Failed to construct '{}': {}", id, message)
            }
            DiError::Cache(message) => write!(f, "Graph cache error: {}", message),
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for container operations
///
/// A convenience alias for `Result<T, DiError>` used throughout the crate.
///
/// ```rust
/// use ferrous_wire::{DiResult, DiError};
///
/// fn lookup(found: bool) -> DiResult<&'static str> {
///     if found { Ok("db") } else { Err(DiError::ServiceNotFound("db".into())) }
/// }
///
/// assert!(lookup(true).is_ok());
/// assert!(lookup(false).is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
