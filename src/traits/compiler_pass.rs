//! Pre-resolution hooks over the definition registry.

use crate::error::DiResult;
use crate::registration::Registry;

/// A mutation step run over the registry before bindings are resolved.
///
/// Passes run in descending [`priority`](CompilerPass::priority) order; passes
/// with equal priority keep their registration order.
///
/// ```rust
/// use ferrous_wire::{CompilerPass, ContainerBuilder, DiResult, Registry};
///
/// struct TagEverything;
///
/// impl CompilerPass for TagEverything {
///     fn process(&self, registry: &mut Registry) -> DiResult<()> {
///         for id in registry.service_ids() {
///             registry.add_tag(&id, ["audited"]);
///         }
///         Ok(())
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.define("a", Default::default());
/// builder.add_compiler_pass(TagEverything);
/// builder.compile().unwrap();
/// assert_eq!(builder.registry().find_tagged_service_ids("audited"), vec!["a".to_string()]);
/// ```
pub trait CompilerPass: Send + Sync {
    fn process(&self, registry: &mut Registry) -> DiResult<()>;

    fn priority(&self) -> i32 {
        0
    }
}

impl<F> CompilerPass for F
where
    F: Fn(&mut Registry) -> DiResult<()> + Send + Sync,
{
    fn process(&self, registry: &mut Registry) -> DiResult<()> {
        self(registry)
    }
}
