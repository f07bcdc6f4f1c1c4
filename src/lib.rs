//! # ferrous-wire
//!
//! A declarative service graph container: services are described by
//! definitions, resolved into a binding graph, checked for cycles and
//! missing references, and then built on demand under their scope.
//!
//! ## Features
//!
//! - **Declarative definitions**: build them fluently or load them from any
//!   serde source as a [`DefinitionSet`]
//! - **Argument references**: `@service`, `%parameter%`, `$ENV$` and literals
//! - **Autowiring**: type-directed (`autowire`) or directive-directed
//!   (`annotwire`) over an explicit [`TypeRegistry`]
//! - **Scopes**: singleton, request, prototype and private services
//! - **Lazy proxies**: class, method and property strategies
//! - **Decorators and middleware**: wrap instances at construction or on
//!   every lookup
//! - **Thread-safe**: at-most-once construction of shared services
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_wire::{Arguments, ContainerBuilder, DefinitionSet, ParamDescriptor, Service, TypeDescriptor};
//! use std::any::Any;
//! use std::sync::Arc;
//!
//! struct MySqlAdapter {
//!     path: String,
//! }
//!
//! impl Service for MySqlAdapter {
//!     fn type_name(&self) -> &str { "MySQLAdapter" }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! let definitions: DefinitionSet = serde_json::from_str(r#"{
//!     "parameters": { "db.path": "/var/data" },
//!     "services": {
//!         "db": { "class": "MySQLAdapter", "arguments": ["%db.path%"] }
//!     }
//! }"#).unwrap();
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_type(
//!     TypeDescriptor::new("MySQLAdapter", |args| Ok(Arc::new(MySqlAdapter { path: args.string(0)? })))
//!         .param(ParamDescriptor::string("path")),
//! );
//! builder.load_definitions(definitions);
//!
//! let container = builder.build().unwrap();
//! let db = container.get("db").unwrap();
//! assert_eq!(db.downcast_ref::<MySqlAdapter>().unwrap().path, "/var/data");
//! ```
//!
//! ## Scopes
//!
//! - **singleton**: built once per container
//! - **request**: built once per request, dropped by [`Container::end_request`]
//! - **prototype**: built on every lookup
//! - **private**: only reachable as a dependency of another service
//! - **proxy**: reserved; resolving it fails with [`DiError::NotImplemented`]
//!
//! ## Cycles
//!
//! By default a graph containing a cycle is rejected by
//! [`ContainerBuilder::build`]:
//!
//! ```rust
//! use ferrous_wire::{ContainerBuilder, DiError};
//!
//! let mut builder = ContainerBuilder::new();
//! builder.set_class("a", "A").add_argument("a", "@b");
//! builder.set_class("b", "B").add_argument("b", "@a");
//! # use ferrous_wire::{Service, TypeDescriptor};
//! # use std::{any::Any, sync::Arc};
//! # struct Node;
//! # impl Service for Node { fn type_name(&self) -> &str { "Node" } fn as_any(&self) -> &dyn Any { self } }
//! # builder.register_type(TypeDescriptor::new("A", |_| Ok(Arc::new(Node))));
//! # builder.register_type(TypeDescriptor::new("B", |_| Ok(Arc::new(Node))));
//!
//! match builder.build() {
//!     Err(DiError::CircularDependency(chain)) => assert_eq!(chain, ["a", "b", "a"]),
//!     _ => unreachable!(),
//! }
//! ```

// Module declarations
pub mod binding;
pub mod cache;
pub mod collection;
pub mod config;
pub mod definition;
pub mod error;
pub mod lazy;
pub mod lifetime;
pub mod middleware;
pub mod observer;
pub mod prewarm;
pub mod provider;
pub mod traits;
pub mod types;
pub mod value;

// Internal modules
mod internal;
mod registration;
mod resolver;

// Re-export core types
pub use binding::{ArgumentSpec, Binding, ConstructorBinding, MethodCallBinding};
pub use cache::{GraphCache, InMemoryGraphCache};
pub use collection::ContainerBuilder;
pub use config::{ContainerConfig, CyclePolicy, Environment};
pub use definition::{DefinitionDefaults, DefinitionSet, FactorySpec, MethodCall, ServiceDefinition};
pub use error::{DiError, DiResult};
pub use lazy::{ClassProxy, MethodProxy, PropertyProxy};
pub use lifetime::{LazyStrategy, Scope, Visibility, WiringMode};
pub use middleware::{Middleware, Next};
pub use observer::{ContainerObserver, CountingObserver, LoggingObserver, ServiceUsage};
pub use prewarm::{PreloadReport, PreloadResult};
pub use provider::Container;
pub use registration::Registry;
pub use traits::{CompilerPass, Service};
pub use types::{MethodDescriptor, ParamDescriptor, ParamType, Primitive, TypeDescriptor, TypeRegistry};
pub use value::{Arguments, Injected, Instance, Value};
