//! LIFO list of instances whose `cleanup` hook runs at teardown.

use crate::value::Instance;

/// Built instances in construction order.
///
/// Teardown runs `cleanup` in reverse, so a service is cleaned up before the
/// dependencies it was built from.
#[derive(Default)]
pub(crate) struct CleanupBag {
    instances: Vec<(String, Instance)>,
}

impl CleanupBag {
    pub(crate) fn push(&mut self, id: &str, instance: Instance) {
        self.instances.push((id.to_string(), instance));
    }

    /// Runs every hook, newest first, and empties the bag.
    pub(crate) fn run_all_reverse(&mut self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.instances.len());
        while let Some((id, instance)) = self.instances.pop() {
            instance.cleanup();
            order.push(id);
        }
        order
    }

    /// Hands the contents over, leaving the bag empty.
    pub(crate) fn take(&mut self) -> CleanupBag {
        std::mem::take(self)
    }
}
