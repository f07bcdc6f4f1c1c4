//! Middleware pipeline applied to every resolved instance.
//!
//! Global middleware runs first, in registration order, followed by the
//! middleware registered for the specific service. Each stage either passes
//! the instance on with [`Next::run`] or returns its own instance, which ends
//! the chain.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DiResult;
use crate::value::Instance;

/// A stage in the middleware chain.
///
/// Middleware runs on every `get`, including for cached singletons, so a
/// stage that wraps instances should memoize its wrappers if identity
/// matters.
///
/// # Examples
///
/// ```
/// use ferrous_wire::{DiResult, Instance, Middleware, Next};
///
/// struct Audit;
///
/// impl Middleware for Audit {
///     fn process(&self, instance: Instance, id: &str, next: Next<'_>) -> DiResult<Instance> {
///         println!("handing out {}", id);
///         next.run(instance)
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    fn process(&self, instance: Instance, id: &str, next: Next<'_>) -> DiResult<Instance>;
}

/// The rest of the chain after the current stage.
pub struct Next<'a> {
    id: &'a str,
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Passes `instance` to the following stage; the last stage returns it.
    pub fn run(self, instance: Instance) -> DiResult<Instance> {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.process(instance, self.id, Next { id: self.id, rest }),
            None => Ok(instance),
        }
    }

    pub fn id(&self) -> &str {
        self.id
    }

    /// Stages still to run after this one.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

/// Adapter for closure middleware.
pub(crate) struct FnMiddleware<F>(pub(crate) F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Instance, &str, Next<'_>) -> DiResult<Instance> + Send + Sync,
{
    fn process(&self, instance: Instance, id: &str, next: Next<'_>) -> DiResult<Instance> {
        (self.0)(instance, id, next)
    }
}

/// Global and per-service middleware, combined per id at build time.
#[derive(Default, Clone)]
pub(crate) struct MiddlewarePipeline {
    global: Vec<Arc<dyn Middleware>>,
    chains: HashMap<String, Vec<Arc<dyn Middleware>>>,
}

impl MiddlewarePipeline {
    pub(crate) fn new(
        global: Vec<Arc<dyn Middleware>>,
        per_service: HashMap<String, Vec<Arc<dyn Middleware>>>,
    ) -> Self {
        let chains = per_service
            .into_iter()
            .map(|(id, own)| {
                let mut chain = global.clone();
                chain.extend(own);
                (id, chain)
            })
            .collect();
        Self { global, chains }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.global.is_empty() && self.chains.is_empty()
    }

    pub(crate) fn apply(&self, instance: Instance, id: &str) -> DiResult<Instance> {
        let chain = self.chains.get(id).unwrap_or(&self.global);
        Next { id, rest: chain }.run(instance)
    }
}
