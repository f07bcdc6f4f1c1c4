//! Eager instantiation of services at startup.
//!
//! Services named with [`ContainerBuilder::prewarm`](crate::ContainerBuilder::prewarm),
//! plus every cacheable singleton when
//! [`ContainerConfig::preload_singletons`](crate::ContainerConfig) is set, are
//! built right after the graph is ready so the first request does not pay
//! for their construction.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::binding::Binding;
use crate::error::DiError;
use crate::lifetime::Scope;
use crate::provider::Container;

/// Ids explicitly marked for prewarming, in the order they were added.
#[derive(Debug, Default, Clone)]
pub(crate) struct PrewarmSet {
    ids: Vec<String>,
}

impl PrewarmSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    pub(crate) fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// Outcome of preloading one service.
#[derive(Debug, Clone)]
pub struct PreloadResult {
    pub id: String,
    pub error: Option<DiError>,
    pub duration: Duration,
}

impl PreloadResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Preload results for every service that was built eagerly.
#[derive(Debug, Clone, Default)]
pub struct PreloadReport {
    pub services: Vec<PreloadResult>,
    pub total_duration: Duration,
}

impl PreloadReport {
    pub fn all_ready(&self) -> bool {
        self.services.iter().all(PreloadResult::success)
    }

    pub fn ready_count(&self) -> usize {
        self.services.iter().filter(|r| r.success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.services.len() - self.ready_count()
    }

    pub fn failures(&self) -> Vec<&PreloadResult> {
        self.services.iter().filter(|r| !r.success()).collect()
    }

    /// The first failure, if any.
    pub fn first_error(&self) -> Option<&DiError> {
        self.services.iter().find_map(|r| r.error.as_ref())
    }
}

/// Singletons that are safe to build without a caller: shared, not lazy and
/// not pre-built.
pub(crate) fn is_preloadable(binding: &Binding) -> bool {
    binding.shared
        && !binding.lazy.is_lazy()
        && matches!(binding.scope, Scope::Singleton | Scope::Private)
        && !matches!(binding.constructor, crate::binding::ConstructorBinding::Synthetic)
}

impl Container {
    /// Builds every preloadable singleton in registration order and reports
    /// how each one went. Private services are built too, as if requested by
    /// another service.
    ///
    /// ```
    /// use ferrous_wire::{ContainerBuilder, Service, TypeDescriptor};
    /// use std::any::Any;
    /// use std::sync::Arc;
    ///
    /// struct Pool;
    /// impl Service for Pool {
    ///     fn type_name(&self) -> &str { "Pool" }
    ///     fn as_any(&self) -> &dyn Any { self }
    /// }
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.register_type(TypeDescriptor::new("Pool", |_| Ok(Arc::new(Pool))));
    /// builder.set_class("pool", "Pool");
    /// let container = builder.build().unwrap();
    ///
    /// let report = container.preload_singletons();
    /// assert!(report.all_ready());
    /// assert_eq!(report.ready_count(), 1);
    /// ```
    pub fn preload_singletons(&self) -> PreloadReport {
        let ids: Vec<String> = self
            .bindings_in_order()
            .into_iter()
            .filter(|b| is_preloadable(b))
            .map(|b| b.id.clone())
            .collect();
        self.preload(&ids)
    }

    pub(crate) fn preload(&self, ids: &[String]) -> PreloadReport {
        let start = Instant::now();
        let mut services = Vec::with_capacity(ids.len());
        for id in ids {
            let began = Instant::now();
            let error = self.get_as_dependency(id).err();
            if let Some(error) = &error {
                warn!(service = %id, %error, "preload failed");
            }
            services.push(PreloadResult {
                id: id.clone(),
                error,
                duration: began.elapsed(),
            });
        }
        let report = PreloadReport {
            services,
            total_duration: start.elapsed(),
        };
        debug!(
            ready = report.ready_count(),
            failed = report.failed_count(),
            elapsed = ?report.total_duration,
            "preload finished"
        );
        report
    }
}
