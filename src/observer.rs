//! Diagnostic observers for resolution events.
//!
//! Observers are notified synchronously on every resolution; keep them
//! lightweight. [`LoggingObserver`] forwards events to `tracing`, and
//! [`CountingObserver`] keeps per-service usage counts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::DiError;

/// Observer trait for container resolution events.
///
/// # Examples
///
/// ```
/// use ferrous_wire::{ContainerBuilder, ContainerObserver, DiError};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct Audit;
///
/// impl ContainerObserver for Audit {
///     fn resolving(&self, id: &str) {
///         println!("-> {}", id);
///     }
///
///     fn resolved(&self, id: &str, duration: Duration) {
///         println!("<- {} in {:?}", id, duration);
///     }
///
///     fn failed(&self, id: &str, error: &DiError) {
///         eprintln!("!! {}: {}", id, error);
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(Arc::new(Audit));
/// let container = builder.build().unwrap();
/// ```
pub trait ContainerObserver: Send + Sync {
    /// Called before a service is looked up.
    fn resolving(&self, id: &str);

    /// Called after a service was returned, with the time taken.
    fn resolved(&self, id: &str, duration: Duration);

    /// Called when a resolution fails.
    fn failed(&self, id: &str, error: &DiError);

    /// Called when a new instance has actually been constructed.
    fn constructed(&self, _id: &str) {}
}

/// Registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ContainerObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ContainerObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, id: &str) {
        for observer in &self.observers {
            observer.resolving(id);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, id: &str, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(id, duration);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, id: &str, error: &DiError) {
        for observer in &self.observers {
            observer.failed(id, error);
        }
    }

    #[inline]
    pub(crate) fn constructed(&self, id: &str) {
        for observer in &self.observers {
            observer.constructed(id);
        }
    }
}

/// Built-in observer that emits `tracing` events.
///
/// Resolutions are logged at `trace`, constructions at `debug` and failures
/// at `warn`, each with a `service` field.
///
/// ```
/// use ferrous_wire::{ContainerBuilder, LoggingObserver};
/// use std::sync::Arc;
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(Arc::new(LoggingObserver::new()));
/// let container = builder.build().unwrap();
/// ```
pub struct LoggingObserver {
    target: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            target: "ferrous-wire".to_string(),
        }
    }

    /// Tags every event with `container = name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self { target: name.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerObserver for LoggingObserver {
    fn resolving(&self, id: &str) {
        trace!(container = %self.target, service = %id, "resolving");
    }

    fn resolved(&self, id: &str, duration: Duration) {
        trace!(container = %self.target, service = %id, ?duration, "resolved");
    }

    fn failed(&self, id: &str, error: &DiError) {
        warn!(container = %self.target, service = %id, %error, "resolution failed");
    }

    fn constructed(&self, id: &str) {
        debug!(container = %self.target, service = %id, "constructed");
    }
}

/// Per-service usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceUsage {
    pub resolutions: usize,
    pub constructions: usize,
    pub failures: usize,
}

/// Observer that counts resolutions, constructions and failures per id.
///
/// ```
/// use ferrous_wire::{ContainerBuilder, CountingObserver};
/// use std::sync::Arc;
///
/// let counter = Arc::new(CountingObserver::new());
/// let mut builder = ContainerBuilder::new();
/// builder.add_observer(counter.clone());
/// let container = builder.build().unwrap();
///
/// assert!(container.get("missing").is_err());
/// assert_eq!(counter.usage("missing").failures, 1);
/// ```
#[derive(Default)]
pub struct CountingObserver {
    usage: Mutex<HashMap<String, ServiceUsage>>,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage(&self, id: &str) -> ServiceUsage {
        self.usage.lock().get(id).copied().unwrap_or_default()
    }

    /// Ids that were resolved at least once, sorted.
    pub fn used_services(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .usage
            .lock()
            .iter()
            .filter(|(_, u)| u.resolutions > 0)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn reset(&self) {
        self.usage.lock().clear();
    }
}

impl ContainerObserver for CountingObserver {
    fn resolving(&self, _id: &str) {}

    fn resolved(&self, id: &str, _duration: Duration) {
        self.usage.lock().entry(id.to_string()).or_default().resolutions += 1;
    }

    fn failed(&self, id: &str, _error: &DiError) {
        self.usage.lock().entry(id.to_string()).or_default().failures += 1;
    }

    fn constructed(&self, id: &str) {
        self.usage.lock().entry(id.to_string()).or_default().constructions += 1;
    }
}
