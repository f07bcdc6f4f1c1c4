//! Per-call resolution state.

use crate::error::DiResult;
use crate::internal::ResolvingStack;

/// State owned by one top-level `get`.
///
/// The context is created empty for each external request and threaded
/// through every nested dependency resolution, so the cycle check only ever
/// sees frames from its own call.
#[derive(Debug, Default)]
pub(crate) struct ResolutionContext {
    stack: ResolvingStack,
}

impl ResolutionContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with `id` on the stack. The frame is popped whether `f`
    /// succeeds or not.
    pub(crate) fn guarded<T>(&mut self, id: &str, f: impl FnOnce(&mut Self) -> DiResult<T>) -> DiResult<T> {
        self.stack.enter(id)?;
        let result = f(self);
        self.stack.exit(id);
        result
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiError;

    #[test]
    fn frames_are_popped_on_failure() {
        let mut ctx = ResolutionContext::new();
        let result: DiResult<()> = ctx.guarded("a", |_| Err(DiError::ServiceNotFound("b".into())));
        assert!(result.is_err());
        assert!(ctx.is_idle());
    }

    #[test]
    fn reentering_reports_the_chain() {
        let mut ctx = ResolutionContext::new();
        let result = ctx.guarded("a", |ctx| ctx.guarded("b", |ctx| ctx.guarded("a", |_| Ok(()))));
        assert_eq!(result, Err(DiError::CircularDependency(vec!["a".into(), "b".into(), "a".into()])));
        assert!(ctx.is_idle());
    }
}
