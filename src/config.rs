//! Container configuration and the environment table.
//!
//! [`ContainerConfig`] carries the container-wide defaults applied to every
//! definition (visibility, wiring mode) plus build policies. [`Environment`]
//! is the snapshot consulted when an argument is written as `$NAME$`.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::lifetime::WiringMode;
use crate::value::Value;

/// What the build does when the binding graph contains a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Reject the whole graph with `CircularDependency`
    #[default]
    RejectGraph,
    /// Log the cycle and let only a `get` that walks into it fail
    FailOnResolve,
}

/// Container-wide defaults and build policies.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{ContainerConfig, CyclePolicy, WiringMode};
///
/// let config = ContainerConfig::default()
///     .with_default_wiring(WiringMode::Autowire)
///     .with_cycle_policy(CyclePolicy::FailOnResolve)
///     .with_public_by_default(false);
///
/// assert_eq!(config.default_wiring, WiringMode::Autowire);
/// assert!(!config.public_by_default);
/// assert_eq!(config.graph_cache_key, "dependency_graph");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Services without an explicit visibility are reachable from outside
    pub public_by_default: bool,
    /// Wiring mode for definitions that set neither `autowire` nor `annotwire`
    pub default_wiring: WiringMode,
    pub cycle_policy: CyclePolicy,
    /// Build every eager singleton right after the graph is built
    pub preload_singletons: bool,
    /// Key under which the resolved graph is stored in a [`crate::GraphCache`]
    pub graph_cache_key: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            public_by_default: true,
            default_wiring: WiringMode::Explicit,
            cycle_policy: CyclePolicy::RejectGraph,
            preload_singletons: false,
            graph_cache_key: "dependency_graph".to_string(),
        }
    }
}

impl ContainerConfig {
    pub fn with_public_by_default(mut self, public: bool) -> Self {
        self.public_by_default = public;
        self
    }

    pub fn with_default_wiring(mut self, wiring: WiringMode) -> Self {
        self.default_wiring = wiring;
        self
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    pub fn with_preload_singletons(mut self, preload: bool) -> Self {
        self.preload_singletons = preload;
        self
    }

    pub fn with_graph_cache_key(mut self, key: impl Into<String>) -> Self {
        self.graph_cache_key = key.into();
        self
    }
}

/// Snapshot of environment values available to `$NAME$` arguments.
///
/// The snapshot is taken once; later changes to the process environment are
/// not observed, which keeps argument resolution a pure function of the
/// graph, the parameters and this table.
///
/// ```rust
/// use ferrous_wire::{Environment, Value};
///
/// let env = Environment::from_pairs([("APP_PORT", "8080"), ("APP_HOST", "localhost")]);
/// assert_eq!(env.get("APP_PORT"), Some(&Value::Integer(8080)));
/// assert_eq!(env.get("APP_HOST"), Some(&Value::String("localhost".into())));
/// assert!(env.get("APP_DEBUG").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    values: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from explicit name/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Value::from_env_str(v.as_ref())))
            .collect();
        Self { values }
    }

    /// Captures the whole process environment.
    pub fn from_process() -> Self {
        Self::from_pairs(env::vars())
    }

    /// Captures variables named `PREFIX_*`, keyed without the prefix.
    ///
    /// The prefix is matched case-insensitively against upper-cased names,
    /// so `with_prefix("myapp")` exposes `MYAPP_DATABASE_URL` as
    /// `DATABASE_URL`.
    pub fn from_process_with_prefix(prefix: &str) -> Self {
        let wanted = format!("{}_", prefix.to_uppercase());
        Self::from_pairs(env::vars().filter_map(|(key, value)| {
            key.strip_prefix(&wanted)
                .map(|rest| (rest.to_string(), value.clone()))
        }))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
